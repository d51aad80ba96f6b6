//! Use `OrEnvExt` when a CLI arg (e.g. `crs_path: Option<PathBuf>`) can also
//! be set by a fallback env var (e.g. `$CRS_PATH`): `crs_path.or_env_mut("CRS_PATH")?`.
//!
//! Works with any `FromStr` type; the env value is parsed and an error is
//! raised if parsing fails.

use std::env;
use std::str::FromStr;

use anyhow::Context;

pub trait OrEnvExt: Sized {
    /// Takes ownership of the arg if set, otherwise initializes it from env.
    fn or_env(mut self, env_var: &'static str) -> anyhow::Result<Self> {
        self.or_env_mut(env_var)?;
        Ok(self)
    }

    /// If the arg is not set, initialize it from env by mutating in place.
    fn or_env_mut(&mut self, env_var: &'static str) -> anyhow::Result<&mut Self>;
}

fn env_var_opt(env_var: &'static str) -> anyhow::Result<Option<String>> {
    match env::var(env_var) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(s)) => {
            Err(anyhow::format_err!("invalid unicode: '{s:?}'"))
        }
    }
}

impl<T> OrEnvExt for Option<T>
where
    T: FromStr,
    T::Err: Into<anyhow::Error>,
{
    fn or_env_mut(&mut self, env_var: &'static str) -> anyhow::Result<&mut Self> {
        if self.is_none() {
            let val_str = match env_var_opt(env_var).context(env_var)? {
                Some(v) => v,
                None => return Ok(self),
            };
            let val = T::from_str(&val_str)
                .map_err(Into::into)
                .with_context(|| format!("invalid env value `${env_var}`"))?;
            *self = Some(val);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unset_arg_falls_back_to_env() {
        // SAFETY: test-only, single-threaded access to this var name.
        unsafe { env::set_var("TEEREX_OR_ENV_TEST", "42") };
        let mut arg: Option<u32> = None;
        arg.or_env_mut("TEEREX_OR_ENV_TEST").unwrap();
        assert_eq!(arg, Some(42));
        unsafe { env::remove_var("TEEREX_OR_ENV_TEST") };
    }

    #[test]
    fn set_arg_ignores_env() {
        let mut arg = Some(7u32);
        arg.or_env_mut("TEEREX_OR_ENV_TEST_UNSET").unwrap();
        assert_eq!(arg, Some(7));
    }
}

use teerex_cli::cli::Args;

fn main() -> anyhow::Result<()> {
    teerex_core::logger::init();
    argh::from_env::<Args>().run()
}

//! A demo CLI driving the Remote Prover Client end-to-end: fetch and verify
//! a TEE-Rex server's attestation, or run a full proving round trip against
//! it.

pub mod cli;

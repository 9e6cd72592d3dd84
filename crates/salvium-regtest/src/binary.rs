//! Locating the daemon and wallet-rpc executables.

use log::debug;
use std::env;
use std::path::PathBuf;

/// An external executable the harness launches.
#[derive(Debug, Clone, Copy)]
pub struct Binary {
    /// Environment variable that overrides the path.
    pub env_var: &'static str,
    /// File name looked up on `PATH`.
    pub name: &'static str,
}

pub const SALVIUMD: Binary = Binary {
    env_var: "SALVIUMD_BIN",
    name: "salviumd",
};

pub const SALVIUM_WALLET_RPC: Binary = Binary {
    env_var: "SALVIUM_WALLET_RPC_BIN",
    name: "salvium-wallet-rpc",
};

impl Binary {
    /// Env override, then `PATH`, then the bare name.
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = env::var_os(self.env_var) {
            let path = PathBuf::from(path);
            debug!("{} from {}: {}", self.name, self.env_var, path.display());
            return path;
        }
        if let Some(path) = which_on_path(self.name) {
            debug!("{} from PATH: {}", self.name, path.display());
            return path;
        }
        PathBuf::from(self.name)
    }
}

fn which_on_path(bin: &str) -> Option<PathBuf> {
    let path_env = env::var_os("PATH")?;
    env::split_paths(&path_env)
        .map(|p| p.join(bin))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_binary_falls_back_to_name() {
        let bin = Binary {
            env_var: "SALVIUM_REGTEST_TEST_UNSET_BIN",
            name: "salvium-regtest-no-such-binary",
        };
        assert_eq!(bin.resolve(), PathBuf::from("salvium-regtest-no-such-binary"));
    }

    #[test]
    fn test_env_override() {
        let bin = Binary {
            env_var: "SALVIUM_REGTEST_TEST_OVERRIDE_BIN",
            name: "salviumd",
        };
        env::set_var(bin.env_var, "/opt/salvium/bin/salviumd");
        assert_eq!(bin.resolve(), PathBuf::from("/opt/salvium/bin/salviumd"));
        env::remove_var(bin.env_var);
    }
}

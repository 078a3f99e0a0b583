use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "asuippd")]
#[command(version)]
#[command(about = "Workload-points sidecar: JSON requests on stdin, responses on stdout", long_about = None)]
pub struct Cli {
    /// Start with the main window hidden; reported to the shell by `health`.
    #[arg(long, action = ArgAction::SetTrue)]
    pub tray: bool,

    /// Workspace to open at startup.
    #[arg(long, value_name = "DIR", env = "ASUIPP_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    #[arg(long, value_name = "FILTER", env = "ASUIPP_LOG", default_value = "info")]
    pub log_filter: String,
}

/// `$APPDATA/ASUIPP`, then `$XDG_DATA_HOME/asuipp`, then `~/.local/share/asuipp`.
pub fn default_workspace() -> Option<PathBuf> {
    let var = |name: &str| {
        std::env::var_os(name)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    };
    if let Some(appdata) = var("APPDATA") {
        return Some(appdata.join("ASUIPP"));
    }
    if let Some(xdg) = var("XDG_DATA_HOME") {
        return Some(xdg.join("asuipp"));
    }
    var("HOME").map(|home| home.join(".local").join("share").join("asuipp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from(["asuippd", "--tray", "--workspace", "/tmp/ws", "--log-filter", "debug"]);
        assert!(cli.tray);
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(cli.log_filter, "debug");
    }
}

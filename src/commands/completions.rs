use clap::{Args, CommandFactory};
use clap_complete::Shell;
use std::io;

use crate::cli::Cli;

#[derive(Debug, Clone, Args)]
pub struct CompletionsCommand {
    #[arg(value_enum, help = "Shell to generate the completion script for")]
    pub shell: Shell,
}

impl CompletionsCommand {
    pub fn execute(self) {
        let mut cmd = Cli::command();
        let app_name = cmd.get_name().to_string();
        clap_complete::generate(self.shell, &mut cmd, app_name, &mut io::stdout());
    }

    #[cfg(test)]
    pub fn generate_to_string(&self) -> String {
        let mut cmd = Cli::command();
        let app_name = cmd.get_name().to_string();
        let mut buffer = Vec::new();
        clap_complete::generate(self.shell, &mut cmd, app_name, &mut buffer);
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_specific_markers() {
        let cases: [(Shell, &[&str]); 5] = [
            (
                Shell::Bash,
                &["_rolechain()", "COMPREPLY", "complete -F _rolechain"],
            ),
            (Shell::Zsh, &["#compdef rolechain", "_arguments"]),
            (Shell::Fish, &["complete -c rolechain", "__fish_rolechain"]),
            (
                Shell::PowerShell,
                &["Register-ArgumentCompleter", "-CommandName 'rolechain'"],
            ),
            (Shell::Elvish, &["edit:completion:arg-completer[rolechain]"]),
        ];

        for (shell, markers) in cases {
            let script = CompletionsCommand { shell }.generate_to_string();
            assert!(!script.is_empty(), "{shell} completion script is empty");

            for marker in markers {
                assert!(
                    script.contains(marker),
                    "'{marker}' not found in {shell} completion script"
                );
            }
        }
    }

    #[test]
    fn test_completion_lists_subcommands() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
            let script = CompletionsCommand { shell }.generate_to_string();

            for subcommand in ["run", "status", "completions"] {
                assert!(
                    script.contains(subcommand),
                    "{subcommand} missing from {shell} completions"
                );
            }
        }
    }

    #[test]
    fn test_completion_lists_options() {
        for shell in [Shell::Bash, Shell::Zsh] {
            let script = CompletionsCommand { shell }.generate_to_string();

            for option in ["--profile", "--target-profile", "--renew"] {
                assert!(
                    script.contains(option),
                    "{option} missing from {shell} completions"
                );
            }
        }
    }
}

//! Shell completion scripts for the rustible-azure CLI.

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};

use crate::cli::Cli;

const BIN_NAME: &str = "rustible-azure";

/// Arguments for the completions command
#[derive(Parser, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,

    /// Print where to install the script instead of the script itself
    #[arg(long)]
    pub instructions: bool,
}

impl CompletionsArgs {
    pub fn execute(&self) -> i32 {
        if self.instructions {
            println!("{}", install_hint(self.shell));
        } else {
            print!("{}", script(self.shell));
        }
        0
    }
}

/// Render the completion script for `shell`
pub fn script(shell: Shell) -> String {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    generate(shell, &mut cmd, BIN_NAME, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// One-line command that installs the script for `shell`
pub fn install_hint(shell: Shell) -> String {
    match shell {
        Shell::Bash => format!("echo 'eval \"$({0} completions bash)\"' >> ~/.bashrc", BIN_NAME),
        Shell::Zsh => format!(
            "mkdir -p ~/.zsh/completions && {0} completions zsh > ~/.zsh/completions/_{0}",
            BIN_NAME
        ),
        Shell::Fish => format!(
            "{0} completions fish > ~/.config/fish/completions/{0}.fish",
            BIN_NAME
        ),
        Shell::PowerShell => format!(
            "Add-Content $PROFILE 'Invoke-Expression (& {} completions powershell | Out-String)'",
            BIN_NAME
        ),
        Shell::Elvish => format!(
            "echo 'eval ({} completions elvish | slurp)' >> ~/.elvish/rc.elv",
            BIN_NAME
        ),
        _ => format!("{} completions <shell> > <your shell's completion dir>", BIN_NAME),
    }
}

//! Interactive input: plain prompts on stderr and password entry that
//! never echoes. Scripts pass `--password-stdin` to pipe passwords in,
//! one per line.

use std::io::BufRead;

/// Ask a question on stderr and read one trimmed line from stdin.
pub fn prompt(question: &str) -> String {
    eprint!("{question} ");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input).unwrap_or_default();
    input.trim().to_string()
}

/// Where passwords come from.
#[derive(Debug)]
pub enum SecretSource {
    /// Prompt on the controlling terminal without echo.
    Terminal,
    /// Pre-read lines, consumed in order.
    Lines(std::vec::IntoIter<String>),
}

impl SecretSource {
    /// Terminal prompts, or every line of stdin when `from_stdin` is set.
    pub fn new(from_stdin: bool) -> anyhow::Result<Self> {
        if from_stdin {
            Ok(Self::from_reader(std::io::stdin().lock())?)
        } else {
            Ok(Self::Terminal)
        }
    }

    pub fn from_reader(reader: impl BufRead) -> std::io::Result<Self> {
        let lines = reader
            .lines()
            .map(|l| l.map(|l| l.trim_end_matches('\r').to_owned()))
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self::Lines(lines.into_iter()))
    }

    /// Read one secret. Empty input is rejected.
    pub fn read(&mut self, label: &str) -> anyhow::Result<String> {
        let value = match self {
            Self::Terminal => rpassword::prompt_password_stderr(&format!("{label}: "))?,
            Self::Lines(lines) => lines
                .next()
                .ok_or_else(|| anyhow::anyhow!("expected {label} on stdin"))?,
        };
        if value.is_empty() {
            anyhow::bail!("{label} must not be empty");
        }
        Ok(value)
    }

    /// Read a new password. On a terminal it is typed twice and both
    /// entries must match; piped input supplies it once.
    pub fn read_new(&mut self, label: &str) -> anyhow::Result<String> {
        let first = self.read(label)?;
        if matches!(self, Self::Terminal) {
            let again = self.read(&format!("Repeat {}", label.to_lowercase()))?;
            if again != first {
                anyhow::bail!("passwords do not match");
            }
        }
        Ok(first)
    }
}

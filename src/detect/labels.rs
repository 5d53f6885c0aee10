use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::policy::INTEREST_SET;

/// Class vocabulary of a model: class id -> label string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Labels {
    names: Vec<String>,
}

impl Labels {
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(anyhow!("label vocabulary must not be empty"));
        }
        if let Some(pos) = names.iter().position(|name| name.trim().is_empty()) {
            return Err(anyhow!("label for class {} is blank", pos));
        }
        Ok(Self { names })
    }

    /// Vocabulary of a model trained on the two bottle classes only.
    pub fn interest_default() -> Self {
        Self {
            names: INTEREST_SET.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// Load one label per line. Blank lines and `#` comments are skipped.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read labels file {}", path.display()))?;
        let names = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self::new(names).with_context(|| format!("invalid labels file {}", path.display()))
    }

    pub fn name(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_vocabulary_follows_interest_set() {
        let labels = Labels::interest_default();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.name(0), Some("PET_transparent"));
        assert_eq!(labels.name(1), Some("PET_color"));
        assert_eq!(labels.name(2), None);
    }

    #[test]
    fn loads_labels_file_skipping_comments() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "# bottle classes")?;
        writeln!(file, "can")?;
        writeln!(file)?;
        writeln!(file, "PET_color")?;
        writeln!(file, "  PET_transparent  ")?;

        let labels = Labels::from_file(file.path())?;
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.name(0), Some("can"));
        assert_eq!(labels.name(2), Some("PET_transparent"));
        Ok(())
    }

    #[test]
    fn rejects_empty_vocabulary() {
        assert!(Labels::new(Vec::new()).is_err());
        assert!(Labels::new(vec!["a".into(), " ".into()]).is_err());
    }
}

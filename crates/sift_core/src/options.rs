use crate::consts::OPTIONS_FILE;
use crate::errors::{Result, SiftError};
use crate::merge_op::{builtin, MergeOperator};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Options shared by every cursor opened on a collection.
#[derive(Clone, Default)]
pub struct CollectionOptions {
    pub merge_operator: Option<Arc<dyn MergeOperator>>,
}

impl std::fmt::Debug for CollectionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionOptions")
            .field("merge_operator", &self.merge_operator.as_ref().map(|m| m.name().to_string()))
            .finish()
    }
}

impl CollectionOptions {
    pub fn with_merge_operator(mut self, op: Arc<dyn MergeOperator>) -> Self {
        self.merge_operator = Some(op);
        self
    }

    pub fn merge_operator(&self) -> Option<&dyn MergeOperator> {
        self.merge_operator.as_deref()
    }

    /// Load `options.json` from a store directory; missing file means defaults.
    pub fn load(dir: &Path) -> Result<Self> {
        OptionsFile::load(dir)?.resolve()
    }
}

/// On-disk form of [`CollectionOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_operator: Option<String>,
}

impl OptionsFile {
    pub fn load(dir: &Path) -> Result<Self> {
        let p = dir.join(OPTIONS_FILE);
        if !p.exists() {
            return Ok(Self::default());
        }
        let s = fs::read_to_string(p)?;
        Ok(serde_json::from_str(&s)?)
    }

    pub fn save_atomic(&self, dir: &Path) -> Result<()> {
        let p = dir.join(OPTIONS_FILE);
        let tmp = dir.join(format!("{OPTIONS_FILE}.tmp"));
        let mut f = fs::File::create(&tmp)?;
        f.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
        f.sync_all()?;
        drop(f);
        fs::rename(&tmp, &p)?;
        Ok(())
    }

    pub fn resolve(&self) -> Result<CollectionOptions> {
        let merge_operator = match &self.merge_operator {
            Some(name) => Some(builtin(name).ok_or_else(|| SiftError::UnknownMergeOperator(name.clone()))?),
            None => None,
        };
        Ok(CollectionOptions { merge_operator })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = tempdir().unwrap();
        let opts = CollectionOptions::load(tmp.path()).unwrap();
        assert!(opts.merge_operator().is_none());
    }

    #[test]
    fn named_operator_roundtrip() {
        let tmp = tempdir().unwrap();
        let file = OptionsFile { merge_operator: Some("append".into()) };
        file.save_atomic(tmp.path()).unwrap();
        assert_eq!(OptionsFile::load(tmp.path()).unwrap(), file);

        let opts = CollectionOptions::load(tmp.path()).unwrap();
        assert_eq!(opts.merge_operator().map(|m| m.name()), Some("append"));
    }

    #[test]
    fn unknown_operator_is_an_error() {
        let file = OptionsFile { merge_operator: Some("zip".into()) };
        assert!(matches!(file.resolve(), Err(SiftError::UnknownMergeOperator(n)) if n == "zip"));
    }
}

//! Persisted reference to an engine artifact
//!
//! The engine stores the trained network in its own file. The host's weight
//! document only keeps a pointer to that file.

use mvaplug_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File extension of engine artifacts
pub const ARTIFACT_EXTENSION: &str = "nb";

/// Artifact path written by instances that never trained
pub const UNTRAINED_ARTIFACT: &str = "noFile.nb";

const TEXT_PREFIX: &str = "# NeuroBayes stores its weights in its own file :";

/// Variable count plus the path of the trained artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRecord {
    pub n_variables: usize,
    pub artifact: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct WeightsNode {
    #[serde(rename = "@NVariables")]
    n_variables: usize,
    #[serde(rename = "Expertise")]
    expertise: ExpertiseNode,
}

#[derive(Serialize, Deserialize)]
struct ExpertiseNode {
    #[serde(rename = "@File")]
    file: String,
}

impl ReferenceRecord {
    /// Create a record pointing at `artifact`
    pub fn new(n_variables: usize, artifact: impl Into<PathBuf>) -> Self {
        Self {
            n_variables,
            artifact: artifact.into(),
        }
    }

    /// Record for an instance that has no artifact
    pub fn untrained(n_variables: usize) -> Self {
        Self::new(n_variables, UNTRAINED_ARTIFACT)
    }

    /// True if the record carries the "never trained" sentinel
    pub fn is_untrained(&self) -> bool {
        is_untrained_artifact(&self.artifact)
    }

    /// `<Weights NVariables="n"><Expertise File="..."/></Weights>`
    pub fn to_xml(&self) -> Result<String> {
        let node = WeightsNode {
            n_variables: self.n_variables,
            expertise: ExpertiseNode {
                file: self.artifact.to_string_lossy().into_owned(),
            },
        };
        quick_xml::se::to_string_with_root("Weights", &node).map_err(|e| Error::xml(e.to_string()))
    }

    /// Parse the XML form written by [`ReferenceRecord::to_xml`]
    pub fn from_xml(xml: &str) -> Result<Self> {
        let node: WeightsNode =
            quick_xml::de::from_str(xml).map_err(|e| Error::xml(format!("bad weights node: {}", e)))?;
        if node.expertise.file.trim().is_empty() {
            return Err(Error::xml("Expertise node has an empty File attribute"));
        }
        Ok(Self::new(node.n_variables, node.expertise.file.trim()))
    }

    /// Single-line text form used by plain-text weight files.
    ///
    /// The line does not carry the variable count.
    pub fn to_text_line(&self) -> String {
        format!("{}{}", TEXT_PREFIX, self.artifact.display())
    }

    /// Parse a text line; the variable count comes from the caller
    pub fn from_text_line(line: &str, n_variables: usize) -> Result<Self> {
        let (_, path) = line
            .split_once(':')
            .ok_or_else(|| Error::config(format!("no artifact path in weight line '{}'", line)))?;
        let path = path.trim();
        if path.is_empty() {
            return Err(Error::config(format!("empty artifact path in weight line '{}'", line)));
        }
        Ok(Self::new(n_variables, path))
    }
}

/// True if `path` is the "never trained" sentinel
pub fn is_untrained_artifact(path: &Path) -> bool {
    path.as_os_str() == UNTRAINED_ARTIFACT
}

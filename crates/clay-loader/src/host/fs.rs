// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Filesystem script host - JSON module files

use super::{ScriptHost, ScriptRequest};
use crate::error::{ClayError, Result};
use crate::runtime::Clay;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Contents of a module file
///
/// ```json
/// { "depends": ["modules.util"], "exports": { "speed": 200 } }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleFile {
    /// Modules to load alongside this one
    #[serde(default)]
    pub depends: Option<Vec<String>>,
    /// Value registered for the module
    #[serde(default)]
    pub exports: Value,
}

/// Script host reading module files relative to a root directory
#[derive(Debug, Clone)]
pub struct FsHost {
    root: PathBuf,
}

impl FsHost {
    /// Create a host rooted at `root`; absolute URLs ignore the root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, url: &str) -> PathBuf {
        self.root.join(url)
    }
}

#[async_trait]
impl ScriptHost for FsHost {
    async fn load(&self, request: &ScriptRequest, clay: &Clay) -> Result<()> {
        let path = self.path_for(&request.url);
        trace!(path = %path.display(), "reading module file");

        let source = match tokio::fs::read_to_string(&path).await {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ClayError::ScriptNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let file: ModuleFile =
            serde_json::from_str(&source).map_err(|e| ClayError::InvalidModuleFile {
                url: request.url.clone(),
                reason: e.to_string(),
            })?;

        match file.depends {
            Some(depends) => clay.register_with(request.module.clone(), depends, file.exports),
            None => clay.register(request.module.clone(), file.exports),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_module_file_parse() {
        let file: ModuleFile =
            serde_json::from_str(r#"{ "depends": ["a"], "exports": { "n": 1 } }"#).unwrap();
        assert_eq!(file.depends, Some(vec!["a".to_string()]));
        assert_eq!(file.exports, json!({ "n": 1 }));

        let bare: ModuleFile = serde_json::from_str("{}").unwrap();
        assert!(bare.depends.is_none());
        assert_eq!(bare.exports, Value::Null);

        assert!(serde_json::from_str::<ModuleFile>(r#"{ "export": 1 }"#).is_err());
    }

    #[test]
    fn test_path_for_joins_root() {
        let host = FsHost::new("/srv/modules");
        assert_eq!(
            host.path_for("ui/tabs.json"),
            PathBuf::from("/srv/modules/ui/tabs.json")
        );
        assert_eq!(host.path_for("/abs/x.json"), PathBuf::from("/abs/x.json"));
    }
}

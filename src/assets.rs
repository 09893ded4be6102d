//! Locating assets by name across one or more game data directories.
//!
//! Every asset category lives in a fixed subdirectory of a data path and has a
//! fixed set of extensions. A lookup for `"Tank.alo"` with data paths `A` and `B`
//! tries, in order:
//!
//! ```text
//! A/Data/Art/Models/TANK.ALO
//! B/Data/Art/Models/TANK.ALO
//! ```
//!
//! and if the name carries a different extension (or none), each data path is
//! also tried with every known extension substituted.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rootcause::Report;
use tracing::{debug, trace};

use crate::error::Error;
use crate::map::{Map, read_map};
use crate::models::model::{Model, read_model};

/// A category of asset and where to find it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Model,
    Map,
    Texture,
    Shader,
    Config,
}

impl AssetKind {
    /// Directory relative to a data path.
    pub fn directory(self) -> &'static str {
        match self {
            AssetKind::Model => "Data/Art/Models",
            AssetKind::Map => "Data/Art/Maps",
            AssetKind::Texture => "Data/Art/Textures",
            AssetKind::Shader => "Data/Art/Shaders",
            AssetKind::Config => "Data/XML",
        }
    }

    /// Extensions, without the dot, in lookup order.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            AssetKind::Model => &["ALO"],
            AssetKind::Map => &["TED"],
            AssetKind::Texture => &["DDS", "TGA"],
            AssetKind::Shader => &["HLSL"],
            AssetKind::Config => &["XML"],
        }
    }
}

/// Resolves asset names to files under a list of data directories.
///
/// Earlier data paths take priority, so mods are listed before the base game.
#[derive(Debug, Clone, Default)]
pub struct AssetLoader {
    data_paths: Vec<PathBuf>,
}

impl AssetLoader {
    pub fn new(data_paths: Vec<PathBuf>) -> Self {
        AssetLoader { data_paths }
    }

    pub fn data_paths(&self) -> &[PathBuf] {
        &self.data_paths
    }

    pub fn open_model(&self, name: &str) -> Result<Option<File>, Error> {
        self.open(AssetKind::Model, name)
    }

    pub fn open_map(&self, name: &str) -> Result<Option<File>, Error> {
        self.open(AssetKind::Map, name)
    }

    pub fn open_texture(&self, name: &str) -> Result<Option<File>, Error> {
        self.open(AssetKind::Texture, name)
    }

    pub fn open_shader(&self, name: &str) -> Result<Option<File>, Error> {
        self.open(AssetKind::Shader, name)
    }

    pub fn open_config(&self, name: &str) -> Result<Option<File>, Error> {
        self.open(AssetKind::Config, name)
    }

    /// Find and decode a model. Returns `Ok(None)` if no data path has it.
    pub fn load_model(&self, name: &str) -> Result<Option<Model>, Report<Error>> {
        match self.open_model(name)? {
            Some(file) => read_model(BufReader::new(file)).map(Some),
            None => Ok(None),
        }
    }

    /// Find and decode a map. Returns `Ok(None)` if no data path has it.
    pub fn load_map(&self, name: &str) -> Result<Option<Map>, Report<Error>> {
        match self.open_map(name)? {
            Some(file) => read_map(BufReader::new(file)).map(Some),
            None => Ok(None),
        }
    }

    /// Open the first candidate for `name` that is a file.
    ///
    /// A missing file is not an error; failing to open one that exists is.
    pub fn open(&self, kind: AssetKind, name: &str) -> Result<Option<File>, Error> {
        for path in self.candidates(kind, name) {
            if !path.is_file() {
                trace!(path = %path.display(), "asset candidate not found");
                continue;
            }
            let file = File::open(&path)?;
            debug!(path = %path.display(), "resolved asset");
            return Ok(Some(file));
        }
        debug!(name, ?kind, "asset not found");
        Ok(None)
    }

    /// Every path `open` would try for `name`, in order.
    pub fn candidates(&self, kind: AssetKind, name: &str) -> Vec<PathBuf> {
        if name.is_empty() {
            return Vec::new();
        }
        let name = name.to_uppercase();

        let mut file_names = vec![PathBuf::from(&name)];
        for ext in kind.extensions() {
            let substituted = Path::new(&name).with_extension(ext);
            if !file_names.contains(&substituted) {
                file_names.push(substituted);
            }
        }

        file_names
            .iter()
            .flat_map(|file_name| {
                self.data_paths
                    .iter()
                    .map(move |data_path| data_path.join(kind.directory()).join(file_name))
            })
            .collect()
    }
}

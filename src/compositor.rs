//! Edition Compositor - Asset Loading and Layered Drawing
//!
//! Assets of one edition load concurrently; drawing happens strictly in
//! z-order on a single backend.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, Result};
use crate::hashing::{canonical_json, sha256_hex};
use crate::layers::ResolvedElement;

/// A loaded, read-only asset.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    pub reference: String,
    pub bytes: Arc<Vec<u8>>,
    pub hash: String,
}

impl ImageHandle {
    pub fn new(reference: impl Into<String>, bytes: Vec<u8>) -> Self {
        let hash = sha256_hex(&bytes);
        Self {
            reference: reference.into(),
            bytes: Arc::new(bytes),
            hash,
        }
    }
}

/// Loads assets by reference. Called from several threads at once.
pub trait AssetLoader: Send + Sync {
    fn load(&self, reference: &str) -> Result<ImageHandle>;
}

/// Reads assets relative to a root directory.
pub struct FsAssetLoader {
    root: PathBuf,
}

impl FsAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetLoader for FsAssetLoader {
    fn load(&self, reference: &str) -> Result<ImageHandle> {
        let bytes = fs::read(self.root.join(reference)).map_err(|e| GenerationError::AssetLoad {
            asset: reference.to_string(),
            reason: e.to_string(),
        })?;
        Ok(ImageHandle::new(reference, bytes))
    }
}

/// The raster surface. Implementations own their canvas state.
pub trait DrawingBackend {
    fn clear(&mut self, width: u32, height: u32);
    fn draw_background(&mut self, color: &str);
    fn draw_element(&mut self, image: &ImageHandle, element: &ResolvedElement);
    fn draw_text(&mut self, text: &str, position: [i32; 2]);
    fn export(&mut self) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    Clear { width: u32, height: u32 },
    Background { color: String },
    Element {
        z_index: usize,
        asset: String,
        hash: String,
        position: [i32; 2],
        size: Option<[u32; 2]>,
    },
    Text { text: String, position: [i32; 2] },
}

/// Deterministic backend: records draw calls and exports them as canonical JSON.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    ops: Vec<DrawOp>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }
}

impl DrawingBackend for RecordingBackend {
    fn clear(&mut self, width: u32, height: u32) {
        self.ops.clear();
        self.ops.push(DrawOp::Clear { width, height });
    }

    fn draw_background(&mut self, color: &str) {
        self.ops.push(DrawOp::Background { color: color.to_string() });
    }

    fn draw_element(&mut self, image: &ImageHandle, element: &ResolvedElement) {
        self.ops.push(DrawOp::Element {
            z_index: element.z_index,
            asset: image.reference.clone(),
            hash: image.hash.clone(),
            position: element.position,
            size: element.size,
        });
    }

    fn draw_text(&mut self, text: &str, position: [i32; 2]) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            position,
        });
    }

    fn export(&mut self) -> Result<Vec<u8>> {
        Ok(canonical_json(&self.ops)?.into_bytes())
    }
}

/// Pastel background, `hsl(hue, 100%, 85%)`.
pub fn random_pastel<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("hsl({}, 100%, 85%)", rng.gen_range(0..360))
}

pub struct EditionCompositor<'a> {
    loader: &'a dyn AssetLoader,
    backend: &'a mut dyn DrawingBackend,
    width: u32,
    height: u32,
    signature_position: [i32; 2],
}

impl<'a> EditionCompositor<'a> {
    pub fn new(
        loader: &'a dyn AssetLoader,
        backend: &'a mut dyn DrawingBackend,
        width: u32,
        height: u32,
        signature_position: [i32; 2],
    ) -> Self {
        Self {
            loader,
            backend,
            width,
            height,
            signature_position,
        }
    }

    /// Load every element, then draw background, layers and the `#N` signature.
    pub fn compose(
        &mut self,
        edition: u32,
        elements: &[ResolvedElement],
        background: Option<&str>,
    ) -> Result<Vec<u8>> {
        let images = self.load_all(elements)?;

        self.backend.clear(self.width, self.height);
        if let Some(color) = background {
            self.backend.draw_background(color);
        }
        for (image, element) in images.iter().zip(elements) {
            self.backend.draw_element(image, element);
        }
        self.backend.draw_text(&format!("#{}", edition), self.signature_position);
        self.backend.export()
    }

    fn load_all(&self, elements: &[ResolvedElement]) -> Result<Vec<ImageHandle>> {
        let loader = self.loader;
        thread::scope(|scope| {
            let pending: Vec<_> = elements
                .iter()
                .map(|element| (element, scope.spawn(move || loader.load(&element.asset))))
                .collect();

            // Join every loader before reporting, so a panicking one is never left to the scope.
            let loaded: Vec<Result<ImageHandle>> = pending
                .into_iter()
                .map(|(element, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(GenerationError::AssetLoad {
                            asset: element.asset.clone(),
                            reason: "loader thread panicked".into(),
                        })
                    })
                })
                .collect();
            loaded.into_iter().collect()
        })
    }
}

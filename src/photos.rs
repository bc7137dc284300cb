//! Photo slots and their textures.
//!
//! Slots bind to the supplied image list cyclically. Each rebinding bumps
//! the slot's version; a finished load is only applied when the version it
//! was started with is still current, so late decodes of replaced images
//! are dropped instead of overwriting the new binding.

use crate::color::Rgb;
use crate::error::{Result, TreeError};
use image::imageops::FilterType;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Longest side of a decoded photo texture, in texels
pub const TEXTURE_SIZE: u32 = 64;

const PHOTO_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// An externally owned image a slot can show
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageRef {
    /// Built-in image used when no photos were supplied
    Placeholder,
    File(Arc<Path>),
}

impl ImageRef {
    pub fn file(path: impl AsRef<Path>) -> Self {
        ImageRef::File(Arc::from(path.as_ref()))
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRef::Placeholder => write!(f, "<placeholder>"),
            ImageRef::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Decoded RGB texture, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    width: u32,
    height: u32,
    texels: Vec<Rgb>,
}

impl Texture {
    pub fn new(width: u32, height: u32, texels: Vec<Rgb>) -> Option<Self> {
        if width == 0 || height == 0 || texels.len() != (width * height) as usize {
            return None;
        }
        Some(Texture {
            width,
            height,
            texels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Nearest-texel lookup; `u` and `v` are clamped to [0, 1], `v` grows downwards
    pub fn sample(&self, u: f32, v: f32) -> Rgb {
        let x = (u.clamp(0.0, 1.0) * (self.width - 1) as f32).round() as usize;
        let y = (v.clamp(0.0, 1.0) * (self.height - 1) as f32).round() as usize;
        self.texels[y * self.width as usize + x]
    }

    /// A red heart on a warm card
    pub fn placeholder() -> Self {
        let size = TEXTURE_SIZE;
        let background = Rgb::hex("#F9FAFB");
        let heart = Rgb::hex("#EF4444");
        let texels = (0..size * size)
            .map(|i| {
                let x = (i % size) as f32 / size as f32 * 3.0 - 1.5;
                let y = 1.4 - (i / size) as f32 / size as f32 * 3.0;
                let a = x * x + y * y - 1.0;
                if a * a * a - x * x * y * y * y <= 0.0 {
                    heart
                } else {
                    background
                }
            })
            .collect();
        Texture {
            width: size,
            height: size,
            texels,
        }
    }

    /// Decodes a photo file and shrinks it to texture size
    pub fn decode(path: &Path) -> Result<Self> {
        let image = image::open(path).map_err(|source| TreeError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let rgb = image
            .resize(TEXTURE_SIZE, TEXTURE_SIZE, FilterType::Triangle)
            .to_rgb8();
        let (width, height) = rgb.dimensions();
        let texels = rgb.pixels().map(|p| Rgb::rgb8(p[0], p[1], p[2])).collect();
        Texture::new(width, height, texels).ok_or_else(|| TreeError::EmptyImage(path.to_path_buf()))
    }

    pub fn load(image: &ImageRef) -> Result<Self> {
        match image {
            ImageRef::Placeholder => Ok(Texture::placeholder()),
            ImageRef::File(path) => Texture::decode(path),
        }
    }
}

/// Ask to decode `image` for `slot`, tagged with the slot version at request time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub slot: usize,
    pub version: u64,
    pub image: ImageRef,
}

/// A finished decode, in any order relative to other slots
#[derive(Debug)]
pub struct LoadOutcome {
    pub slot: usize,
    pub version: u64,
    pub image: ImageRef,
    pub result: Result<Arc<Texture>>,
}

impl LoadOutcome {
    pub fn finish(request: LoadRequest, result: Result<Texture>) -> Self {
        LoadOutcome {
            slot: request.slot,
            version: request.version,
            image: request.image,
            result: result.map(Arc::new),
        }
    }
}

/// Asynchronous texture decoding
pub trait TextureLoader {
    /// Starts a load; never blocks
    fn request(&mut self, request: LoadRequest);

    /// Collects the loads that finished since the last poll
    fn poll(&mut self) -> Vec<LoadOutcome>;
}

/// Decodes each request on its own thread
pub struct ThreadedLoader {
    sender: Sender<LoadOutcome>,
    receiver: Receiver<LoadOutcome>,
}

impl ThreadedLoader {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        ThreadedLoader { sender, receiver }
    }
}

impl Default for ThreadedLoader {
    fn default() -> Self {
        ThreadedLoader::new()
    }
}

impl TextureLoader for ThreadedLoader {
    fn request(&mut self, request: LoadRequest) {
        log::debug!(
            "loading {} for slot {} (v{})",
            request.image,
            request.slot,
            request.version
        );
        let sender = self.sender.clone();
        std::thread::spawn(move || {
            let result = Texture::load(&request.image);
            // The board may be gone by now; nothing to report in that case.
            let _ = sender.send(LoadOutcome::finish(request, result));
        });
    }

    fn poll(&mut self) -> Vec<LoadOutcome> {
        self.receiver.try_iter().collect()
    }
}

/// Decodes queued requests on the calling thread when polled
#[derive(Debug, Default)]
pub struct SyncLoader {
    pending: Vec<LoadRequest>,
}

impl SyncLoader {
    pub fn new() -> Self {
        SyncLoader::default()
    }

    pub fn pending(&self) -> &[LoadRequest] {
        &self.pending
    }
}

impl TextureLoader for SyncLoader {
    fn request(&mut self, request: LoadRequest) {
        self.pending.push(request);
    }

    fn poll(&mut self) -> Vec<LoadOutcome> {
        self.pending
            .drain(..)
            .map(|request| {
                let result = Texture::load(&request.image);
                LoadOutcome::finish(request, result)
            })
            .collect()
    }
}

/// Image shown by `slot` for a given photo list
pub fn resolve_slot(photos: &[ImageRef], slot: usize) -> ImageRef {
    if photos.is_empty() {
        ImageRef::Placeholder
    } else {
        photos[slot % photos.len()].clone()
    }
}

/// One photo frame's binding and texture
#[derive(Debug, Clone, Default)]
pub struct PhotoSlot {
    binding: Option<ImageRef>,
    version: u64,
    texture: Option<Arc<Texture>>,
    hovered: bool,
}

impl PhotoSlot {
    pub fn binding(&self) -> Option<&ImageRef> {
        self.binding.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn texture(&self) -> Option<&Arc<Texture>> {
        self.texture.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.texture.is_some()
    }

    /// Unloaded slots are fully transparent
    pub fn opacity(&self) -> f32 {
        if self.is_loaded() {
            1.0
        } else {
            0.0
        }
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    /// Multiplier applied to the photo colour
    pub fn tint(&self) -> Rgb {
        if self.hovered {
            Rgb::hex("#FFFFEE")
        } else {
            Rgb::WHITE
        }
    }

    /// The bound image, only once its texture is ready
    pub fn loaded_image(&self) -> Option<&ImageRef> {
        self.texture.as_ref().and(self.binding.as_ref())
    }

    fn release(&mut self, slot: usize) {
        if self.texture.take().is_some() {
            log::debug!("released texture of slot {slot}");
        }
    }
}

/// All photo slots of the tree
#[derive(Debug, Clone)]
pub struct PhotoBoard {
    slots: Vec<PhotoSlot>,
    photos: Vec<ImageRef>,
}

impl PhotoBoard {
    pub fn new(slot_count: usize) -> Self {
        PhotoBoard {
            slots: vec![PhotoSlot::default(); slot_count],
            photos: Vec::new(),
        }
    }

    pub fn slots(&self) -> &[PhotoSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&PhotoSlot> {
        self.slots.get(index)
    }

    pub fn photos(&self) -> &[ImageRef] {
        &self.photos
    }

    /// Rebinds every slot to `photos` and starts loads for the slots that changed.
    ///
    /// Particle geometry is untouched; only the slot to image mapping moves.
    pub fn bind(&mut self, photos: Vec<ImageRef>, loader: &mut dyn TextureLoader) {
        log::info!("binding {} photos to {} slots", photos.len(), self.slots.len());
        self.photos = photos;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let image = resolve_slot(&self.photos, index);
            if slot.binding.as_ref() == Some(&image) {
                continue;
            }
            slot.release(index);
            slot.version += 1;
            slot.binding = Some(image.clone());
            loader.request(LoadRequest {
                slot: index,
                version: slot.version,
                image,
            });
        }
    }

    /// Applies a finished load. Returns true when a texture was installed.
    pub fn apply(&mut self, outcome: LoadOutcome) -> bool {
        let Some(slot) = self.slots.get_mut(outcome.slot) else {
            log::warn!("load finished for unknown slot {}", outcome.slot);
            return false;
        };
        if slot.version != outcome.version {
            log::debug!(
                "discarding stale load of {} for slot {} (v{} != v{})",
                outcome.image,
                outcome.slot,
                outcome.version,
                slot.version
            );
            return false;
        }
        match outcome.result {
            Ok(texture) => {
                log::debug!("slot {} shows {}", outcome.slot, outcome.image);
                slot.texture = Some(texture);
                true
            }
            Err(err) => {
                log::warn!("slot {} stays empty: {err}", outcome.slot);
                false
            }
        }
    }

    /// Applies everything the loader finished since the last call
    pub fn pump(&mut self, loader: &mut dyn TextureLoader) -> usize {
        loader
            .poll()
            .into_iter()
            .map(|outcome| self.apply(outcome))
            .filter(|installed| *installed)
            .count()
    }

    pub fn set_hovered(&mut self, hovered: Option<usize>) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.hovered = Some(index) == hovered;
        }
    }

    /// Drops every texture the board created
    pub fn release_all(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.release(index);
            slot.hovered = false;
        }
    }
}

/// Gathers photos from explicit paths followed by a directory scan
pub fn collect_photos(paths: &[PathBuf], dir: Option<&Path>) -> Result<Vec<ImageRef>> {
    let mut photos: Vec<ImageRef> = paths.iter().map(ImageRef::file).collect();
    if let Some(dir) = dir {
        let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_photo(path))
            .collect();
        found.sort();
        photos.extend(found.into_iter().map(ImageRef::file));
    }
    Ok(photos)
}

fn is_photo(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                PHOTO_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_falls_back_to_placeholder() {
        for slot in 0..5 {
            assert_eq!(resolve_slot(&[], slot), ImageRef::Placeholder);
        }
    }

    #[test]
    fn placeholder_texture_has_a_heart() {
        let texture = Texture::placeholder();
        assert_eq!(texture.sample(0.5, 0.5), Rgb::hex("#EF4444"));
        assert_eq!(texture.sample(0.0, 0.0), Rgb::hex("#F9FAFB"));
    }

    #[test]
    fn hovered_slot_is_tinted() {
        let mut board = PhotoBoard::new(3);
        board.set_hovered(Some(1));
        assert_eq!(board.slots()[1].tint(), Rgb::hex("#FFFFEE"));
        assert_eq!(board.slots()[0].tint(), Rgb::WHITE);

        board.set_hovered(None);
        assert!(board.slots().iter().all(|slot| slot.tint() == Rgb::WHITE));
    }

    #[test]
    fn texture_rejects_mismatched_sizes() {
        assert!(Texture::new(2, 2, vec![Rgb::BLACK; 3]).is_none());
        assert!(Texture::new(0, 2, Vec::new()).is_none());
    }

    #[test]
    fn missing_file_is_an_image_error() {
        let err = Texture::load(&ImageRef::file("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, TreeError::Image { .. }));
    }

    #[test]
    fn collect_photos_keeps_explicit_paths_first() {
        let photos = collect_photos(&[PathBuf::from("b.png"), PathBuf::from("a.png")], None)
            .unwrap();
        assert_eq!(photos, vec![ImageRef::file("b.png"), ImageRef::file("a.png")]);
    }
}

//! Class-per-directory image datasets (`root/<class>/<image>`).

use crate::{DenseNetError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions the `image` decoders handle with default features.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "ppm", "bmp", "pgm", "tif", "tiff", "webp",
];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode an image file to 8-bit RGB, whatever its source colour type.
pub fn load_rgb(path: impl AsRef<Path>) -> Result<image::RgbImage> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|e| {
        DenseNetError::Data(format!("failed to decode {}: {}", path.display(), e))
    })?;
    Ok(img.to_rgb8())
}

/// Index of an image-folder dataset.
///
/// Classes are the sub-directories of the root sorted by name, so class
/// indices are stable across machines.
#[derive(Clone, Debug)]
pub struct ClassFolder {
    root: PathBuf,
    classes: Vec<String>,
    samples: Vec<(PathBuf, i64)>,
}

impl ClassFolder {
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let entries = fs::read_dir(&root).map_err(|e| {
            DenseNetError::Data(format!("cannot read image folder {}: {}", root.display(), e))
        })?;

        let mut class_dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        class_dirs.sort();

        let mut classes = Vec::with_capacity(class_dirs.len());
        let mut samples = Vec::new();
        for (label, dir) in class_dirs.iter().enumerate() {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            classes.push(name);

            let mut files: Vec<PathBuf> = fs::read_dir(dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            files.sort();
            samples.extend(files.into_iter().map(|p| (p, label as i64)));
        }

        if samples.is_empty() {
            return Err(DenseNetError::Data(format!(
                "no images found under {}",
                root.display()
            )));
        }

        tracing::debug!(
            root = %root.display(),
            classes = classes.len(),
            samples = samples.len(),
            "Scanned image folder"
        );

        Ok(Self {
            root,
            classes,
            samples,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn samples(&self) -> &[(PathBuf, i64)] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_scan_sorted_classes() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("zebra/b.JPEG"));
        touch(&dir.path().join("zebra/a.jpg"));
        touch(&dir.path().join("ant/x.png"));
        touch(&dir.path().join("ant/notes.txt"));
        touch(&dir.path().join("README.md"));

        let folder = ClassFolder::scan(dir.path()).unwrap();
        assert_eq!(folder.classes(), &["ant".to_string(), "zebra".to_string()]);
        assert_eq!(folder.len(), 3);

        let labels: Vec<i64> = folder.samples().iter().map(|(_, l)| *l).collect();
        assert_eq!(labels, vec![0, 1, 1]);
        assert!(folder.samples()[1].0.ends_with("zebra/a.jpg"));
    }

    #[test]
    fn test_decodes_every_indexed_extension() {
        let dir = tempdir().unwrap();
        let img = image::RgbImage::from_fn(5, 3, |x, y| image::Rgb([x as u8 * 40, y as u8 * 80, 7]));
        fs::create_dir_all(dir.path().join("cls")).unwrap();
        for ext in IMAGE_EXTENSIONS {
            let path = dir.path().join("cls").join(format!("sample.{}", ext));
            // The pnm encoder picks its subtype from the extension; pgm is greyscale only
            if *ext == "pgm" {
                image::DynamicImage::ImageRgb8(img.clone()).to_luma8().save(&path).unwrap();
            } else {
                img.save(&path).unwrap();
            }
        }

        let folder = ClassFolder::scan(dir.path()).unwrap();
        assert_eq!(folder.len(), IMAGE_EXTENSIONS.len());
        for (path, label) in folder.samples() {
            let rgb = load_rgb(path).unwrap();
            assert_eq!(rgb.dimensions(), (5, 3), "{}", path.display());
            assert_eq!(*label, 0);
        }
    }

    #[test]
    fn test_undecodable_file_is_data_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"not a png").unwrap();

        let err = load_rgb(&path).unwrap_err();
        assert!(err.to_string().contains("broken.png"));
    }

    #[test]
    fn test_empty_or_missing_root_is_error() {
        let dir = tempdir().unwrap();
        assert!(ClassFolder::scan(dir.path()).is_err());
        assert!(ClassFolder::scan(dir.path().join("missing")).is_err());
    }
}

#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn create_temp_directory() -> TempDir {
    TempDir::new().unwrap()
}

pub fn write_image(path: &Path, width: u32, height: u32, format: ImageFormat) -> PathBuf {
    RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]))
        .save_with_format(path, format)
        .unwrap();
    path.to_path_buf()
}

/// A mix of eligible, ineligible and broken files at the top level.
pub fn create_test_tree(temp_dir: &Path) -> Vec<PathBuf> {
    let mut files = vec![
        write_image(&temp_dir.join("photo.jpg"), 64, 48, ImageFormat::Jpeg),
        write_image(&temp_dir.join("icon.png"), 16, 16, ImageFormat::Png),
    ];

    let txt_file = temp_dir.join("notes.txt");
    File::create(&txt_file)
        .unwrap()
        .write_all(b"not an image")
        .unwrap();
    files.push(txt_file);

    files
}

pub fn create_nested_directory_structure(temp_dir: &Path) -> PathBuf {
    let subdir = temp_dir.join("subdir");
    std::fs::create_dir(&subdir).unwrap();
    write_image(&subdir.join("nested.png"), 32, 32, ImageFormat::Png);
    subdir
}

//! Archive packing and unpacking for both platform families: zip for the
//! Windows artifact, gzip-compressed tar for the Linux one.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

use dropship_platform::ArchiveFormat;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Zip {
        context: &'static str,
        #[source]
        source: zip::result::ZipError,
    },
}

impl ArchiveError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    fn zip(context: &'static str, source: zip::result::ZipError) -> Self {
        Self::Zip { context, source }
    }

    fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::io(
            context,
            std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        )
    }
}

/// Pack the contents of `src_dir` (not the directory itself) into `dest`.
///
/// # Errors
/// Returns an error when the source tree cannot be read or the archive
/// cannot be written.
pub fn pack(format: ArchiveFormat, src_dir: &Path, dest: &Path) -> Result<(), ArchiveError> {
    match format {
        ArchiveFormat::Zip => pack_zip(src_dir, dest),
        ArchiveFormat::TarGz => pack_tar_gz(src_dir, dest),
    }
}

/// Unpack `archive` into `dest`. Entries that would escape `dest` are
/// skipped with a warning rather than failing the whole extraction.
///
/// # Errors
/// Returns an error when the archive is unreadable or an entry cannot be
/// written.
pub fn unpack(format: ArchiveFormat, archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    match format {
        ArchiveFormat::Zip => unpack_zip(archive, dest),
        ArchiveFormat::TarGz => unpack_tar_gz(archive, dest),
    }
}

fn pack_zip(src_dir: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = std::fs::File::create(dest)
        .map_err(|e| ArchiveError::io_with_path("failed to create zip archive", dest, &e))?;
    let mut writer = zip::ZipWriter::new(file);

    for (path, rel) in walk_files(src_dir)? {
        let name = rel.to_string_lossy().replace('\\', "/");
        let options = zip_entry_options(&path);
        writer
            .start_file(&name, options)
            .map_err(|e| ArchiveError::zip("failed to start zip entry", e))?;
        let mut input = std::fs::File::open(&path)
            .map_err(|e| ArchiveError::io_with_path("failed to open staged file", &path, &e))?;
        std::io::copy(&mut input, &mut writer)
            .map_err(|e| ArchiveError::io_with_path("failed to write zip entry", &path, &e))?;
    }

    writer
        .finish()
        .map_err(|e| ArchiveError::zip("failed to finalize zip archive", e))?;
    debug!("packed {} into {}", src_dir.display(), dest.display());
    Ok(())
}

#[cfg(unix)]
fn zip_entry_options(path: &Path) -> zip::write::SimpleFileOptions {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)
        .map(|m| m.permissions().mode())
        .unwrap_or(0o644);
    zip::write::SimpleFileOptions::default().unix_permissions(mode)
}

#[cfg(not(unix))]
fn zip_entry_options(_path: &Path) -> zip::write::SimpleFileOptions {
    zip::write::SimpleFileOptions::default()
}

fn pack_tar_gz(src_dir: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = std::fs::File::create(dest)
        .map_err(|e| ArchiveError::io_with_path("failed to create tar archive", dest, &e))?;
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);

    builder
        .append_dir_all(".", src_dir)
        .map_err(|e| ArchiveError::io("failed to append staged tree to tar", e))?;
    let encoder = builder
        .into_inner()
        .map_err(|e| ArchiveError::io("failed to finalize tar archive", e))?;
    encoder
        .finish()
        .map_err(|e| ArchiveError::io("failed to finalize gzip stream", e))?;

    debug!("packed {} into {}", src_dir.display(), dest.display());
    Ok(())
}

fn unpack_zip(archive_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = std::fs::File::open(archive_path)
        .map_err(|e| ArchiveError::io_with_path("failed to open zip archive", archive_path, &e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ArchiveError::zip("failed to read zip archive", e))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ArchiveError::zip("failed to read zip entry", e))?;
        let Some(name) = entry.enclosed_name() else {
            warn!("skipping zip entry with unsafe path");
            continue;
        };
        let out_path = dest.join(name);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| {
                ArchiveError::io_with_path("failed to create extracted directory", &out_path, &e)
            })?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ArchiveError::io_with_path("failed to create extraction parent", parent, &e)
                })?;
            }
            let mut outfile = std::fs::File::create(&out_path).map_err(|e| {
                ArchiveError::io_with_path("failed to create extracted file", &out_path, &e)
            })?;
            std::io::copy(&mut entry, &mut outfile).map_err(|e| {
                ArchiveError::io_with_path("failed to extract archive entry", &out_path, &e)
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    let _ = std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode));
                }
            }
        }
    }

    debug!("unpacked {} into {}", archive_path.display(), dest.display());
    Ok(())
}

fn unpack_tar_gz(archive_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = std::fs::File::open(archive_path)
        .map_err(|e| ArchiveError::io_with_path("failed to open tar archive", archive_path, &e))?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);

    std::fs::create_dir_all(dest)
        .map_err(|e| ArchiveError::io_with_path("failed to create extraction dir", dest, &e))?;
    // tar::Archive::unpack refuses entries that escape dest.
    archive
        .unpack(dest)
        .map_err(|e| ArchiveError::io("failed to unpack tar archive", e))?;

    debug!("unpacked {} into {}", archive_path.display(), dest.display());
    Ok(())
}

/// All regular files under `root`, paired with their paths relative to it.
fn walk_files(root: &Path) -> Result<Vec<(PathBuf, PathBuf)>, ArchiveError> {
    fn visit(
        root: &Path,
        dir: &Path,
        out: &mut Vec<(PathBuf, PathBuf)>,
    ) -> Result<(), ArchiveError> {
        for entry in std::fs::read_dir(dir)
            .map_err(|e| ArchiveError::io_with_path("failed to read staged directory", dir, &e))?
        {
            let entry =
                entry.map_err(|e| ArchiveError::io("failed to read staged directory entry", e))?;
            let path = entry.path();
            if path.is_dir() {
                visit(root, &path, out)?;
            } else {
                let rel = path
                    .strip_prefix(root)
                    .expect("walked paths stay under their root")
                    .to_path_buf();
                out.push((path, rel));
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    visit(root, root, &mut files)?;
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_fixture(root: &Path) {
        std::fs::create_dir_all(root.join("assets")).unwrap();
        std::fs::write(root.join("lobby-server"), b"binary").unwrap();
        std::fs::write(root.join("version.txt"), b"2024-01-05.1\n").unwrap();
        std::fs::write(root.join("assets/map.dat"), b"map-data").unwrap();
    }

    #[test]
    fn tar_gz_round_trip_preserves_tree() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let staged = temp.path().join("staged");
        stage_fixture(&staged);
        let archive = temp.path().join("out.tar.gz");
        let extracted = temp.path().join("extracted");

        pack(ArchiveFormat::TarGz, &staged, &archive).expect("pack should succeed");
        unpack(ArchiveFormat::TarGz, &archive, &extracted).expect("unpack should succeed");

        assert_eq!(std::fs::read(extracted.join("lobby-server")).unwrap(), b"binary");
        assert_eq!(
            std::fs::read_to_string(extracted.join("version.txt")).unwrap(),
            "2024-01-05.1\n"
        );
        assert_eq!(std::fs::read(extracted.join("assets/map.dat")).unwrap(), b"map-data");
    }

    #[test]
    fn zip_round_trip_preserves_tree() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let staged = temp.path().join("staged");
        stage_fixture(&staged);
        let archive = temp.path().join("out.zip");
        let extracted = temp.path().join("extracted");

        pack(ArchiveFormat::Zip, &staged, &archive).expect("pack should succeed");
        unpack(ArchiveFormat::Zip, &archive, &extracted).expect("unpack should succeed");

        assert_eq!(std::fs::read(extracted.join("lobby-server")).unwrap(), b"binary");
        assert_eq!(std::fs::read(extracted.join("assets/map.dat")).unwrap(), b"map-data");
    }

    #[cfg(unix)]
    #[test]
    fn zip_round_trip_keeps_executable_bits() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir should be created");
        let staged = temp.path().join("staged");
        std::fs::create_dir_all(&staged).unwrap();
        let binary = staged.join("game-server");
        std::fs::write(&binary, b"elf").unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

        let archive = temp.path().join("out.zip");
        let extracted = temp.path().join("extracted");
        pack(ArchiveFormat::Zip, &staged, &archive).unwrap();
        unpack(ArchiveFormat::Zip, &archive, &extracted).unwrap();

        let mode = std::fs::metadata(extracted.join("game-server"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111, "executable bits should survive");
    }

    #[test]
    fn unpack_zip_skips_unsafe_paths() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let archive = temp.path().join("unsafe.zip");
        let extracted = temp.path().join("extracted");

        let file = std::fs::File::create(&archive).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("../escape.txt", options).unwrap();
        std::io::Write::write_all(&mut writer, b"nope").unwrap();
        writer.finish().unwrap();

        unpack(ArchiveFormat::Zip, &archive, &extracted).expect("unpack should not fail");

        assert!(!temp.path().join("escape.txt").exists());
    }
}

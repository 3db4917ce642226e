//! Streaming downloads with content digests.
//!
//! Every byte that lands on disk also passes through SHA-256, so the digest
//! returned by [`download`] is the digest of the file at `dest`. Downloads go
//! through a temp file in the destination directory and are moved into place
//! only once the stream has ended cleanly, so a broken transfer never leaves
//! a half-written file behind.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use syndic_core::types::Dataset;

use crate::error::{io_err, transfer_err, SyncError};
use crate::reconcile::ResourceDescriptor;

const CHUNK_SIZE: usize = 8192;

/// Download `url` to `dest`, returning the lowercase hex SHA-256 of the body.
pub fn download(
    http: &reqwest::blocking::Client,
    url: &str,
    dest: &Path,
) -> Result<String, SyncError> {
    let mut response = http.get(url).send().map_err(|e| transfer_err(url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::TransferStatus {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| io_err(parent, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = response.read(&mut buf).map_err(|e| transfer_err(url, e))?;
        if n == 0 {
            break;
        }
        tmp.as_file_mut()
            .write_all(&buf[..n])
            .map_err(|e| io_err(tmp.path(), e))?;
        hasher.update(&buf[..n]);
    }

    tmp.persist(dest).map_err(|e| io_err(dest, e.error))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Fetch every active resource of `dataset` into `workdir` and describe the
/// result for reconciliation.
///
/// Resources without a URL become descriptors with no digest and no upload;
/// they still participate in matching so the target keeps their metadata.
pub(crate) fn download_dataset_resources(
    http: &reqwest::blocking::Client,
    dataset: &Dataset,
    workdir: &Path,
) -> Result<Vec<ResourceDescriptor>, SyncError> {
    let mut descriptors = Vec::new();
    for (index, resource) in dataset.resources.iter().enumerate() {
        if !resource.is_active() {
            continue;
        }
        if resource.url.is_empty() {
            descriptors.push(ResourceDescriptor {
                name: resource.name.clone(),
                format: resource.format.clone(),
                description: resource.description.clone(),
                digest: None,
                upload: None,
            });
            continue;
        }
        let dest = resource_dest(workdir, index, &resource.url);
        let digest = download(http, &resource.url, &dest)?;
        descriptors.push(ResourceDescriptor {
            name: resource.name.clone(),
            format: resource.format.clone(),
            description: resource.description.clone(),
            digest: Some(digest),
            upload: Some(dest),
        });
    }
    Ok(descriptors)
}

/// Each resource gets its own subdirectory so identical filenames from
/// different resources cannot collide.
fn resource_dest(workdir: &Path, index: usize, url: &str) -> PathBuf {
    let filename = match url.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => "resource",
    };
    workdir.join(index.to_string()).join(filename)
}

//! Content addressable ids
//!
//! Hashing whole files is too slow for large media, so big files are sampled:
//! a few evenly spaced windows plus the tail, together with the file size.
//! Files small enough to fit in the samples are hashed completely.

use blake3::Hasher;
use std::path::Path;
use tokio::{
	fs::File,
	io::{self, AsyncReadExt, AsyncSeekExt, SeekFrom},
};

const SAMPLE_COUNT: u64 = 4;
const SAMPLE_SIZE: u64 = 10 * 1024;
const MINIMUM_FILE_SIZE: u64 = SAMPLE_SIZE * (SAMPLE_COUNT + 1);

/// Hex characters kept from the blake3 digest
pub const CAS_ID_LENGTH: usize = 16;

async fn read_at(file: &mut File, offset: u64, buf: &mut [u8]) -> Result<(), io::Error> {
	file.seek(SeekFrom::Start(offset)).await?;
	file.read_exact(buf).await?;
	Ok(())
}

/// `size` is the size reported by the scan, a file that shrank since then fails with
/// `UnexpectedEof` instead of hashing stale data.
pub async fn generate_cas_id(path: impl AsRef<Path>, size: u64) -> Result<String, io::Error> {
	let mut file = File::open(path).await?;
	let mut hasher = Hasher::new();
	hasher.update(&size.to_le_bytes());

	if size <= MINIMUM_FILE_SIZE {
		let mut buf = Vec::with_capacity(size as usize);
		file.read_to_end(&mut buf).await?;
		if buf.len() as u64 != size {
			return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
		}
		hasher.update(&buf);
	} else {
		let mut buf = vec![0u8; SAMPLE_SIZE as usize];
		let interval = size / SAMPLE_COUNT;

		for i in 0..SAMPLE_COUNT {
			read_at(&mut file, interval * i, &mut buf).await?;
			hasher.update(&buf);
		}

		read_at(&mut file, size - SAMPLE_SIZE, &mut buf).await?;
		hasher.update(&buf);
	}

	let mut id = hasher.finalize().to_hex().to_string();
	id.truncate(CAS_ID_LENGTH);
	Ok(id)
}

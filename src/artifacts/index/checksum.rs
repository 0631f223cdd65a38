use crate::artifacts::index::CHECKSUM_SIZE;
use crate::errors::Error;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::{Read, Write};

/// Reader or writer that feeds every byte it moves through a running SHA-1
///
/// Index files end with the digest of everything before it, so the same
/// wrapper is used to produce that trailer and to verify it.
#[derive(Debug)]
pub struct Checksum<T> {
    inner: T,
    digest: Sha1,
}

impl<T> Checksum<T> {
    pub fn new(inner: T) -> Self {
        Checksum {
            inner,
            digest: Sha1::new(),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<R: Read> Checksum<R> {
    pub fn read(&mut self, size: usize) -> anyhow::Result<Bytes> {
        let mut buffer = vec![0; size];
        self.inner
            .read_exact(&mut buffer)
            .map_err(|_| Error::corrupt_index("unexpected end-of-file while reading index"))?;

        self.digest.update(&buffer);
        Ok(Bytes::from(buffer))
    }

    pub fn verify(&mut self) -> anyhow::Result<()> {
        let mut expected_checksum = [0u8; CHECKSUM_SIZE];
        self.inner
            .read_exact(&mut expected_checksum)
            .map_err(|_| Error::corrupt_index("missing trailing checksum"))?;

        let actual_checksum = self.digest.clone().finalize();

        if expected_checksum.as_slice() != actual_checksum.as_slice() {
            return Err(Error::corrupt_index("checksum does not match value stored on disk").into());
        }

        Ok(())
    }
}

impl<W: Write> Checksum<W> {
    pub fn write(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.inner.write_all(data)?;
        self.digest.update(data);
        Ok(())
    }

    pub fn write_checksum(&mut self) -> anyhow::Result<()> {
        let checksum = self.digest.clone().finalize();
        self.inner.write_all(checksum.as_slice())?;

        Ok(())
    }
}

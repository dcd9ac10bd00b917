//! Staging files for disk-staged builds
//!
//! A staging file holds the serialized matrices of one component between
//! the write pass and the read pass of an out-of-core build. Its life is a
//! small state machine:
//!
//! ```text
//! Empty -> Writing -> Written -> Reading -> Built
//!             \           \          \
//!              +-----------+----------+--> Failed
//! ```
//!
//! Layout: a [`StagingHeader`] followed by `record_count` records, each a
//! [`RecordHeader`] and `payload_len` bytes written by the matrix itself.
//! The header is rewritten with the final record count on `finish_write`.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use opcomp_core::{OperatorCategory, RecordHeader, StagingHeader};
use tracing::{debug, warn};

use crate::error::{OpError, Result};
use crate::matrix::OperatorMatrix;

/// Lifecycle of a staging file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingState {
    Empty,
    Writing,
    Written,
    Reading,
    Built,
    Failed,
}

/// Temporary file carrying one component's matrices through an
/// out-of-core build
pub struct StagingFile {
    path: PathBuf,
    header: StagingHeader,
    state: StagingState,
    writer: Option<BufWriter<File>>,
    keep: bool,
}

impl StagingFile {
    /// Staging file at `path`. Nothing touches the disk until
    /// [`begin_write`](Self::begin_write).
    pub fn new(
        path: impl Into<PathBuf>,
        category: OperatorCategory,
        component_id: u64,
        keep: bool,
    ) -> Self {
        Self {
            path: path.into(),
            header: StagingHeader::new(category, component_id),
            state: StagingState::Empty,
            writer: None,
            keep,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> StagingState {
        self.state
    }

    pub fn records_written(&self) -> u64 {
        self.header.record_count
    }

    /// Create the file and write a provisional header
    pub fn begin_write(&mut self) -> Result<()> {
        self.require_state(StagingState::Empty)?;
        let header = self.header.to_bytes_array();
        let opened = File::create(&self.path).and_then(|file| {
            let mut writer = BufWriter::new(file);
            writer.write_all(&header)?;
            Ok(writer)
        });
        match opened {
            Ok(writer) => {
                debug!(path = %self.path.display(), "staging file opened");
                self.writer = Some(writer);
                self.state = StagingState::Writing;
                Ok(())
            }
            Err(source) => Err(self.fail_io(source)),
        }
    }

    /// Append one built matrix
    pub fn write_record<M: OperatorMatrix>(
        &mut self,
        flat_index: usize,
        position: usize,
        matrix: &M,
    ) -> Result<()> {
        self.require_state(StagingState::Writing)?;

        let mut payload = Vec::new();
        if let Err(source) = matrix.write_to(&mut payload) {
            return Err(self.fail_io(source));
        }
        let record = RecordHeader {
            flat_index: flat_index as u64,
            position: position as u64,
            payload_len: payload.len() as u64,
        };

        let result = match self.writer.as_mut() {
            Some(writer) => writer
                .write_all(&record.to_bytes_array())
                .and_then(|()| writer.write_all(&payload)),
            None => return Err(self.state_error(StagingState::Writing)),
        };
        result.map_err(|source| self.fail_io(source))?;
        self.header.record_count += 1;
        Ok(())
    }

    /// Flush, stamp the final record count into the header and close
    pub fn finish_write(&mut self) -> Result<()> {
        self.require_state(StagingState::Writing)?;
        let Some(writer) = self.writer.take() else {
            return Err(self.state_error(StagingState::Writing));
        };
        let header = self.header.to_bytes_array();

        let result = writer
            .into_inner()
            .map_err(|err| err.into_error())
            .and_then(|mut file| {
                file.seek(SeekFrom::Start(0))?;
                file.write_all(&header)?;
                file.sync_all()
            });
        result.map_err(|source| self.fail_io(source))?;

        debug!(
            path = %self.path.display(),
            records = self.header.record_count,
            "staging file written"
        );
        self.state = StagingState::Written;
        Ok(())
    }

    /// Replay every record in write order.
    ///
    /// `sink` receives each record header and a reader limited to its
    /// payload, which it must consume completely. Returns the number of
    /// records read.
    pub fn read_records<F>(&mut self, mut sink: F) -> Result<u64>
    where
        F: FnMut(RecordHeader, &mut dyn Read) -> Result<()>,
    {
        self.require_state(StagingState::Written)?;
        self.state = StagingState::Reading;
        match self.read_pass(&mut sink) {
            Ok(count) => {
                self.state = StagingState::Built;
                Ok(count)
            }
            Err(err) => {
                self.state = StagingState::Failed;
                Err(err)
            }
        }
    }

    #[cfg(feature = "mmap")]
    fn read_pass<F>(&self, sink: &mut F) -> Result<u64>
    where
        F: FnMut(RecordHeader, &mut dyn Read) -> Result<()>,
    {
        let file = File::open(&self.path).map_err(|source| self.io_error(source))?;
        // SAFETY: the file is private to this build and not written while mapped
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|source| self.io_error(source))?;
        let mut cursor: &[u8] = &mmap;
        self.drain(&mut cursor, sink)
    }

    #[cfg(not(feature = "mmap"))]
    fn read_pass<F>(&self, sink: &mut F) -> Result<u64>
    where
        F: FnMut(RecordHeader, &mut dyn Read) -> Result<()>,
    {
        let file = File::open(&self.path).map_err(|source| self.io_error(source))?;
        let mut reader = io::BufReader::new(file);
        self.drain(&mut reader, sink)
    }

    fn drain<R, F>(&self, reader: &mut R, sink: &mut F) -> Result<u64>
    where
        R: Read,
        F: FnMut(RecordHeader, &mut dyn Read) -> Result<()>,
    {
        let mut buf = [0u8; StagingHeader::SIZE];
        reader.read_exact(&mut buf).map_err(|source| self.io_error(source))?;
        let header = StagingHeader::from_bytes(&buf)
            .map_err(|err| self.corrupt(format!("bad header: {err}")))?;
        if header.category != self.header.category
            || header.component_id != self.header.component_id
            || header.record_count != self.header.record_count
        {
            return Err(self.corrupt("header does not match the write pass"));
        }

        for _ in 0..header.record_count {
            let mut buf = [0u8; RecordHeader::SIZE];
            reader.read_exact(&mut buf).map_err(|source| self.io_error(source))?;
            let record = RecordHeader::from_bytes(&buf)
                .map_err(|err| self.corrupt(format!("bad record header: {err}")))?;

            let mut payload = reader.by_ref().take(record.payload_len);
            sink(record, &mut payload)?;
            if payload.limit() != 0 {
                return Err(self.corrupt(format!(
                    "record {} left {} payload bytes unread",
                    record.flat_index,
                    payload.limit()
                )));
            }
        }

        let mut probe = [0u8; 1];
        match reader.read(&mut probe) {
            Ok(0) => Ok(header.record_count),
            Ok(_) => Err(self.corrupt("trailing bytes after last record")),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn require_state(&self, expected: StagingState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.state_error(expected))
        }
    }

    fn state_error(&self, expected: StagingState) -> OpError {
        OpError::StagingState {
            expected,
            found: self.state,
        }
    }

    fn io_error(&self, source: io::Error) -> OpError {
        OpError::Staging {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupt(&self, reason: impl Into<String>) -> OpError {
        OpError::CorruptStaging {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn fail_io(&mut self, source: io::Error) -> OpError {
        self.state = StagingState::Failed;
        self.writer = None;
        self.io_error(source)
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        self.writer = None;
        if self.keep || self.state == StagingState::Empty {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "staging file removed"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to remove staging file")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::{DenseBlockOperator, SiteBasis, StateInfo};
    use opcomp_core::{OperatorSector, OrbitalIndices, SpinQuantum};

    fn built_ops(n: usize) -> Vec<DenseBlockOperator> {
        let basis = SiteBasis::full(n, StateInfo::new(vec![2, 3]));
        (0..n)
            .map(|i| {
                let sector = OperatorSector::single(SpinQuantum::new(1, 1, 0));
                let mut op = DenseBlockOperator::template(
                    OperatorCategory::Cre,
                    OrbitalIndices::one(i),
                    sector,
                );
                op.build(&basis).unwrap();
                op
            })
            .collect()
    }

    fn write_all(staging: &mut StagingFile, ops: &[DenseBlockOperator]) {
        staging.begin_write().unwrap();
        for (i, op) in ops.iter().enumerate() {
            staging.write_record(i, 0, op).unwrap();
        }
        staging.finish_write().unwrap();
    }

    #[test]
    fn test_write_then_read_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let ops = built_ops(4);
        let path = dir.path().join("CRE_1.tmp");
        let mut staging = StagingFile::new(path, OperatorCategory::Cre, 1, false);
        write_all(&mut staging, &ops);
        assert_eq!(staging.state(), StagingState::Written);
        assert_eq!(staging.records_written(), 4);

        let mut restored = Vec::new();
        let count = staging
            .read_records(|record, reader| {
                assert_eq!(record.flat_index as usize, restored.len());
                restored.push(DenseBlockOperator::read_from(reader).unwrap());
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 4);
        assert_eq!(restored, ops);
        assert_eq!(staging.state(), StagingState::Built);
    }

    #[test]
    fn test_wrong_transition_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CRE_2.tmp");
        let mut staging = StagingFile::new(path, OperatorCategory::Cre, 2, false);
        let ops = built_ops(1);

        let err = staging.write_record(0, 0, &ops[0]).unwrap_err();
        assert!(matches!(
            err,
            OpError::StagingState { expected: StagingState::Writing, found: StagingState::Empty }
        ));
        assert!(staging.read_records(|_, _| Ok(())).is_err());

        staging.begin_write().unwrap();
        assert!(staging.begin_write().is_err());
    }

    #[test]
    fn test_unconsumed_payload_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CRE_3.tmp");
        let mut staging = StagingFile::new(path, OperatorCategory::Cre, 3, false);
        write_all(&mut staging, &built_ops(2));

        let err = staging.read_records(|_, _| Ok(())).unwrap_err();
        assert!(matches!(err, OpError::CorruptStaging { .. }));
        assert_eq!(staging.state(), StagingState::Failed);
    }

    #[test]
    fn test_truncated_file_fails_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CRE_4.tmp");
        let mut staging = StagingFile::new(&path, OperatorCategory::Cre, 4, false);
        write_all(&mut staging, &built_ops(3));

        let len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 10).unwrap();
        drop(file);

        let result = staging.read_records(|_, reader| {
            DenseBlockOperator::read_from(reader).map_err(|source| OpError::Staging {
                path: PathBuf::new(),
                source,
            })?;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(staging.state(), StagingState::Failed);
    }

    #[test]
    fn test_drop_removes_file_unless_kept() {
        let dir = tempfile::tempdir().unwrap();
        let removed = dir.path().join("CRE_5.tmp");
        let kept = dir.path().join("CRE_6.tmp");

        {
            let mut staging = StagingFile::new(&removed, OperatorCategory::Cre, 5, false);
            write_all(&mut staging, &built_ops(1));
            assert!(removed.exists());
        }
        {
            let mut staging = StagingFile::new(&kept, OperatorCategory::Cre, 6, true);
            write_all(&mut staging, &built_ops(1));
        }
        assert!(!removed.exists());
        assert!(kept.exists());
    }

    #[test]
    fn test_missing_directory_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut staging = StagingFile::new(
            dir.path().join("missing").join("CRE_7.tmp"),
            OperatorCategory::Cre,
            7,
            false,
        );
        assert!(matches!(staging.begin_write(), Err(OpError::Staging { .. })));
        assert_eq!(staging.state(), StagingState::Failed);
    }
}

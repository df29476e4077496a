//! Replaying a selected series as an mbox for `git am`.

use std::io::{Seek, SeekFrom, Write};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{MailError, Result};
use crate::mail::mbox::{MboxWriter, recode_quoted_printable};
use crate::series::PatchSeries;

/// Writes `series` to `out` as an mbox, announcing each subject on
/// `progress`.
pub fn write_series<W: Write, P: Write>(series: &PatchSeries, out: W, progress: &mut P) -> Result<W> {
    let mut writer = MboxWriter::new(out);
    for patch in series {
        writeln!(progress, "{}", patch.subject()).map_err(MailError::Io)?;
        let contents = recode_quoted_printable(patch.message()).map_err(MailError::Io)?;
        writer
            .write_message(patch.message().envelope(), &contents)
            .map_err(MailError::Io)?;
    }
    writer.flush().map_err(MailError::Io)?;
    Ok(writer.into_inner())
}

/// Stages the mbox for `series` in a temporary file, rewound to its start.
///
/// The file is removed when the returned handle is dropped.
pub fn stage_series<P: Write>(series: &PatchSeries, progress: &mut P) -> Result<NamedTempFile> {
    let staging = NamedTempFile::new().map_err(MailError::Io)?;
    let mut staging = write_series(series, staging, progress)?;
    staging.as_file_mut().seek(SeekFrom::Start(0)).map_err(MailError::Io)?;
    debug!(path = %staging.path().display(), patches = series.len(), "Staged series mbox");
    Ok(staging)
}

use std::fs;
use std::io::BufWriter;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::error::KiraError;
use crate::table::Table;

/// Results directory of a single run. Artifacts are written with
/// temp-file-and-persist so a reader never sees a half-written table.
#[derive(Debug, Clone)]
pub struct RunDirectory {
    root: Utf8PathBuf,
}

impl RunDirectory {
    /// Removes `root` if it exists and creates it empty.
    pub fn recreate(root: &Utf8Path) -> Result<Self, KiraError> {
        if root.as_std_path().exists() {
            fs::remove_dir_all(root.as_std_path())
                .map_err(|err| KiraError::Filesystem(format!("remove {root}: {err}")))?;
        }
        fs::create_dir_all(root.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create {root}: {err}")))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Lookup artifacts carry a leading row-number column.
    pub fn write_lookup(&self, path: &Utf8Path, table: &Table) -> Result<(), KiraError> {
        write_table_atomic(path, table, true)
    }

    pub fn write_output(&self, path: &Utf8Path, table: &Table) -> Result<(), KiraError> {
        write_table_atomic(path, table, false)
    }
}

pub fn read_table(path: &Utf8Path) -> Result<Table, KiraError> {
    let file = fs::File::open(path.as_std_path()).map_err(|err| KiraError::InputRead {
        path: path.as_std_path().to_path_buf(),
        message: err.to_string(),
    })?;
    Table::read_tsv(file).map_err(|err| KiraError::InputRead {
        path: path.as_std_path().to_path_buf(),
        message: err.to_string(),
    })
}

pub fn write_table_atomic(
    path: &Utf8Path,
    table: &Table,
    row_numbers: bool,
) -> Result<(), KiraError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let temp = Builder::new()
        .prefix("kira-ortho-table")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    table.write_tsv(BufWriter::new(temp.as_file()), row_numbers)?;
    temp.persist(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    Ok(())
}

// Directory-backed document corpus.
//
// One plain-text file per document: <corpus_dir>/<document_id>.txt.
// Text is assumed already extracted; PDFs never pass through here.

use std::path::{Path, PathBuf};

use papergrid_engine::{DocumentSource, GridError};

pub struct DirCorpus {
    dir: PathBuf,
}

impl DirCorpus {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn document_path(&self, document_id: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", document_id))
    }
}

impl DocumentSource for DirCorpus {
    fn document_text(&self, document_id: &str) -> Result<String, GridError> {
        std::fs::read_to_string(self.document_path(document_id)).map_err(|_| {
            GridError::DocumentUnavailable {
                document_id: document_id.to_string(),
            }
        })
    }
}

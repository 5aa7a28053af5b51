use std::fs;

/// Loads and saves documents as plain text.
pub struct FileRepository;

impl FileRepository {
    pub fn save_document(text: &str, filename: &str) -> Result<String, String> {
        match fs::write(filename, text) {
            Ok(_) => Ok(filename.to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    pub fn load_document(filename: &str) -> Result<(String, String), String> {
        match fs::read_to_string(filename) {
            Ok(text) => Ok((text, filename.to_string())),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("budget.math");
        let filename = path.to_str().unwrap();

        let saved = FileRepository::save_document("rent = 1200\nrent * 12\n", filename).unwrap();
        assert_eq!(saved, filename);

        let (text, loaded) = FileRepository::load_document(filename).unwrap();
        assert_eq!(text, "rent = 1200\nrent * 12\n");
        assert_eq!(loaded, filename);
    }

    #[test]
    fn test_missing_file() {
        assert!(FileRepository::load_document("/no/such/file.math").is_err());
        assert!(FileRepository::save_document("x", "/no/such/dir/file.math").is_err());
    }
}

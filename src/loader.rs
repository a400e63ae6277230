use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Reads template files for `Engine::page` and `{% loadblock %}`.
pub trait Loader: Send + Sync {
    fn load(&self, path: &str) -> io::Result<String>;
}

/// Loads templates from a resource folder on disk.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    /// Creates a loader that resolves every template path relative to `root`.
    ///
    /// # Examples
    ///
    /// ```
    /// use stencil::Loader;
    ///
    /// let loader = stencil::FsLoader::new("./tests");
    /// assert!(loader.load("layout.html").is_ok());
    /// ```
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsLoader { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Loader for FsLoader {
    fn load(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(self.root.join(path.trim_start_matches('/')))
    }
}

/// Templates kept in memory, keyed by file name.
impl Loader for HashMap<String, String> {
    fn load(&self, path: &str) -> io::Result<String> {
        self.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("Template {} is not found", path),
            )
        })
    }
}

/// Reads every file directly under `dir_name` into a map from file name to content.
///
/// Subdirectories are not visited. A file that cannot be read fails the whole load.
pub fn load_dir(dir_name: impl AsRef<Path>) -> io::Result<HashMap<String, String>> {
    let mut templates = HashMap::new();

    for file in get_all_file_path_under_dir(dir_name.as_ref())? {
        if !file.is_file() {
            continue;
        }

        let file_name = match file.file_name().and_then(|name| name.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        templates.insert(file_name, fs::read_to_string(&file)?);
    }

    Ok(templates)
}

fn get_all_file_path_under_dir(dir_name: &Path) -> io::Result<Vec<PathBuf>> {
    fs::read_dir(dir_name)?
        .map(|x| x.map(|entry| entry.path()))
        .collect()
}

#[test]
fn load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<p>{{ x }}</p>").unwrap();

    let loader = FsLoader::new(dir.path());
    assert_eq!(loader.load("index.html").unwrap(), "<p>{{ x }}</p>");
    assert_eq!(loader.load("/index.html").unwrap(), "<p>{{ x }}</p>");
    assert!(loader.load("missing.html").is_err());
}

#[test]
fn load_from_map() {
    let mut templates = HashMap::new();
    templates.insert("a.html".to_string(), "A".to_string());

    assert_eq!(templates.load("a.html").unwrap(), "A");
    assert_eq!(
        templates.load("b.html").unwrap_err().kind(),
        io::ErrorKind::NotFound
    );
}

#[test]
fn load_whole_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.html"), "A").unwrap();
    fs::write(dir.path().join("b.html"), "B").unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();

    let templates = load_dir(dir.path()).unwrap();
    assert_eq!(templates.len(), 2);
    assert_eq!(templates["b.html"], "B");
    assert!(load_dir(dir.path().join("nowhere")).is_err());

    fs::write(dir.path().join("c.html"), [0xff, 0xfe]).unwrap();
    assert_eq!(
        load_dir(dir.path()).unwrap_err().kind(),
        io::ErrorKind::InvalidData
    );
}

use std::path::PathBuf;

use rocket::State;

use crate::config::Config;
use rocket::fs::NamedFile;

/// The web console is a single-page app; unknown paths fall back to its
/// index so client-side routing works on reload.
pub async fn console_index(c: &State<Config>) -> NamedFile {
    let index = c.public_content.as_path().join("index.html");
    NamedFile::open(&index)
        .await
        .unwrap_or_else(|_| panic!("'{}' does not exist!", index.display()))
}

#[get("/")]
pub async fn app(c: &State<Config>) -> NamedFile {
    console_index(c).await
}

#[get("/<path..>", rank = 10)]
pub async fn app_path(path: PathBuf, c: &State<Config>) -> NamedFile {
    match NamedFile::open(c.public_content.as_path().join(path.as_path())).await {
        Ok(file) => file,
        Err(_) => console_index(c).await,
    }
}

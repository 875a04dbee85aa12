use std::path::PathBuf;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    save_settings(&settings)?;

    let conn = get_connection(&resolved.join("penny.db"))?;
    init_db(&conn)?;

    tracing::info!(data_dir = %resolved.display(), "database ready");
    println!("Initialized penny at {}", resolved.display());
    Ok(())
}

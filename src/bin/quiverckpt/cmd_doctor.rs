use anyhow::Result;
use std::path::PathBuf;

use QuiverCkpt::checkpoint::doctor;
use QuiverCkpt::CkptConfig;

/// Возвращает false, если в файле найдены повреждения.
pub fn exec(path: PathBuf, json: bool) -> Result<bool> {
    let rep = doctor(&path, &CkptConfig::from_env())?;
    if json {
        println!("{}", rep.to_json()?);
    } else {
        print!("{}", rep.render());
    }
    Ok(rep.is_ok())
}

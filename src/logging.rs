use std::{fs::OpenOptions, io};

use env_logger::{Builder, Target};
use log::debug;

use crate::conf::LogConf;

/// Install the process logger. Calling it again is harmless: the first
/// logger stays in place.
pub fn init(conf: &LogConf) -> io::Result<()> {
    let mut builder = Builder::new();
    builder.parse_filters(&conf.level);

    if let Some(path) = &conf.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                eprintln!("Failed to open log file: {}", e);
                e
            })?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    if builder.try_init().is_err() {
        debug!("logger already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_target_is_created() {
        let path = std::env::temp_dir().join(format!("pollshim-log-{}.log", std::process::id()));
        let conf = LogConf {
            level: "debug".to_owned(),
            file: Some(path.clone()),
        };
        init(&conf).unwrap();
        init(&conf).unwrap();
        assert!(path.exists());
        let _ = std::fs::remove_file(path);
    }
}

use std::path::Path;

use config::{Config as ConfigSource, File};

use crate::error::SentrixError;

use super::model::Config;

/// Load the configuration tree from a YAML or JSON file (spec §6 "config
/// registry"), in the style of the teacher's typed `Config::load` entry
/// point, using the `config` crate rather than a hand-rolled parser.
pub fn load(path: &Path) -> Result<Config, SentrixError> {
    let source = ConfigSource::builder()
        .add_source(File::from(path))
        .build()
        .map_err(|e| SentrixError::Config(e.to_string()))?;
    source.try_deserialize().map_err(|e| SentrixError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_minimal_yaml_config() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "checks:\n  - name: cpu\n    command: check-cpu.sh\n    interval: 60\ntesting: true\n"
        )
        .unwrap();

        let cfg = load(file.path()).unwrap();
        assert_eq!(cfg.checks.len(), 1);
        assert_eq!(cfg.checks[0].name, "cpu");
        assert!(cfg.testing);
    }
}

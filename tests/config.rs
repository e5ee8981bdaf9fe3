// Integration tests for configuration loading and validation

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;
    use tempfile::Builder;

    use stage_laser::config::{Config, ConfigError, Mode, load_config};
    use stage_laser::motion::executor::MotionPrimitive;
    use stage_laser::motion::homing::HomingDirection;

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mode, Mode::Debug);
        assert_eq!(config.poll_interval(), Duration::from_millis(200));
        assert_eq!(config.velocity_presets, vec![0, 10, 100, 1000, 5000, 25000]);
        assert_eq!(config.stage.baud, 38400);
        assert_eq!(config.laser.baud, 9600);
        assert_eq!(config.executor.settle_margin_ms, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_toml() {
        let file = write_config(
            ".toml",
            r#"
mode = "release"
velocity_presets = [0, 50, 500]

[stage]
port = "/dev/ttyUSB0"

[laser]
port = "/dev/ttyUSB1"
frequency_hz = 2000

[executor]
primitive = "single_axis"
auto_emission = true

[homing]
direction = "negative"
track_length_mm = 100.0
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.mode, Mode::Release);
        assert_eq!(config.stage.port, "/dev/ttyUSB0");
        assert_eq!(config.executor.primitive, MotionPrimitive::SingleAxis);
        assert!(config.executor.auto_emission);

        let homing = config.homing_settings();
        assert_eq!(homing.direction, HomingDirection::Negative);
        assert_eq!(homing.track_length_mm, 100.0);

        let executor = config.executor_settings();
        assert_eq!(executor.laser_frequency_hz, 2000);
        assert_eq!(executor.settle_margin, Duration::from_millis(300));
    }

    #[test]
    fn test_load_json_with_legacy_keys() {
        let file = write_config(".json", r#"{ "mode": "DEBUG", "FPS": 5 }"#);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.mode, Mode::Debug);
        assert_eq!(config.poll_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_load_flat_json_layout() {
        let file = write_config(
            ".json",
            r#"{
                "mode": "RELEASE",
                "FPS": 30,
                "PORT-stage": 3,
                "PORT-laser": "/dev/ttyACM0",
                "BAUDRATE-stage": 19200,
                "BAUDRATE-laser": 115200,
                "VEL_LIST": [0, 10, 100, 1000]
            }"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.mode, Mode::Release);
        assert_eq!(config.poll_interval(), Duration::from_millis(33));
        assert_eq!(config.stage.port, "COM3");
        assert_eq!(config.laser.port, "/dev/ttyACM0");
        assert_eq!(config.stage_serial().baud_rate, 19200);
        assert_eq!(config.laser_serial().baud_rate, 115200);
        assert_eq!(config.velocity_presets, vec![0, 10, 100, 1000]);
    }

    #[test]
    fn test_links_have_their_own_read_timeouts() {
        let file = write_config(
            ".toml",
            "[stage]\nread_timeout_ms = 250\n\n[laser]\nread_timeout_ms = 2000\n",
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.stage_serial().read_timeout, Duration::from_millis(250));
        assert_eq!(config.laser_serial().read_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn test_release_requires_ports() {
        let file = write_config(".toml", "mode = \"release\"\n");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = Config::default();
        config.velocity_presets = vec![0, 30_000];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.laser.frequency_hz = 5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fps = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file() {
        let file = write_config(".toml", "mode = [");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Toml(_))));
        let file = write_config(".json", "{ mode");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Json(_))));
        assert!(matches!(load_config("/nonexistent/stage.toml"), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_serial_settings_use_device_terminators() {
        let config = Config::default();
        assert_eq!(config.stage_serial().terminator, b'\r');
        assert_eq!(config.laser_serial().terminator, b'\n');
    }
}

// Integration tests for manual jogging

#[cfg(test)]
mod tests {
    use stage_laser::hardware::mock::MockLink;
    use stage_laser::hardware::transport::shared;
    use stage_laser::hardware::StageDriver;
    use stage_laser::motion::{JogController, JogDirection};

    fn controller() -> (JogController, MockLink) {
        let mock = MockLink::new();
        let stage = StageDriver::new(shared(mock.clone()));
        (JogController::new(stage, vec![0, 10, 100, 1000, 5000, 25000]), mock)
    }

    #[tokio::test]
    async fn test_screen_directions_map_to_axes() {
        let (mut jog, mock) = controller();
        jog.jog(JogDirection::Up).await.unwrap();
        jog.jog(JogDirection::Right).await.unwrap();
        assert_eq!(
            mock.sent(),
            vec!["AXIs2:Fspeed0 100", "AXIs2:GO 6", "AXIs1:Fspeed0 100", "AXIs1:GO 5"]
        );
    }

    #[tokio::test]
    async fn test_reversal_stops_axis_first() {
        let (mut jog, mock) = controller();
        jog.jog(JogDirection::Left).await.unwrap();
        mock.clear_sent();
        jog.jog(JogDirection::Right).await.unwrap();
        assert_eq!(
            mock.sent(),
            vec!["AXIs1:STOP Emergency", "AXIs1:Fspeed0 100", "AXIs1:GO 5"]
        );
    }

    #[tokio::test]
    async fn test_rank_zero_does_nothing() {
        let (mut jog, mock) = controller();
        assert!(!jog.jog_rank(JogDirection::Down, 0).await.unwrap());
        assert!(!jog.jog_rank(JogDirection::Down, 42).await.unwrap());
        assert!(mock.sent().is_empty());

        assert!(jog.jog_rank(JogDirection::Down, 3).await.unwrap());
        assert_eq!(mock.sent(), vec!["AXIs2:Fspeed0 1000", "AXIs2:GO 5"]);
    }

    #[tokio::test]
    async fn test_velocity_is_clamped() {
        let (mut jog, _) = controller();
        assert_eq!(jog.set_velocity(0), 1);
        assert_eq!(jog.set_velocity(99_999), 25_000);
        assert_eq!(jog.set_velocity(-5), 1);
        assert_eq!(jog.set_velocity(640), 640);
        assert_eq!(jog.velocity(), 640);
    }

    #[tokio::test]
    async fn test_stop_halts_everything() {
        let (mut jog, mock) = controller();
        jog.jog(JogDirection::Down).await.unwrap();
        jog.stop().await.unwrap();
        assert_eq!(mock.sent().last().map(String::as_str), Some("STOP Emergency"));

        // After a stop a reversal needs no extra axis stop.
        mock.clear_sent();
        jog.jog(JogDirection::Up).await.unwrap();
        assert_eq!(mock.count("AXIs2:STOP Emergency"), 0);
    }
}

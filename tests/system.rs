// End-to-end tests in DEBUG mode: no ports are opened

#[cfg(test)]
mod tests {
    use stage_laser::hardware::mock::MockLink;
    use stage_laser::hardware::transport::shared;
    use stage_laser::motion::{ExecutorState, RunOutcome};
    use stage_laser::{AxisId, Config, EmissionOnExit, StageSystem, SystemError};

    async fn debug_system() -> StageSystem {
        let system = StageSystem::connect(Config::default()).await.unwrap();
        let ready = system.initialize().await.unwrap();
        assert!(ready.x && ready.y);
        system
    }

    #[tokio::test(start_paused = true)]
    async fn test_line_runs_from_current_position() {
        let mut system = debug_system().await;
        system.stage().move_line(1.0, 2.0).await.unwrap();

        let request = system.submit("line, 100, 50, 1000", None).unwrap();
        let outcome = system.execute(&request, true).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed { segments: 1 });
        assert!(!system.laser().is_emitting());

        let position = system.stage().get_position().await.unwrap();
        assert!((position.x - 1.1).abs() < 1e-9);
        assert!((position.y - 1.95).abs() < 1e-9);

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_command() {
        let system = debug_system().await;
        assert!(system.submit("circle, 1, 2", None).is_err());
        assert!(system.submit("line, 1, 2, 0", None).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_home_all_in_debug_mode() {
        let mut system = debug_system().await;
        system.stage().move_abs(AxisId::X, 7.0).await.unwrap();
        system.home(None).await.unwrap();
        assert!(system.is_polling());

        let position = system.stage().get_position().await.unwrap();
        assert_eq!((position.x, position.y), (0.0, 0.0));
        assert!(system.snapshot().seq > 0);

        system.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_run_can_be_cancelled() {
        let mut system = debug_system().await;
        let request = system.submit("rectangle, 1000, 1000, 10", None).unwrap();

        let mut state = system.executor().subscribe();
        let task = system.spawn_execute(request, false).await.unwrap();
        state
            .wait_for(|s| *s == ExecutorState::Running)
            .await
            .unwrap();

        assert!(system.executor().cancel());
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled { segments: 1 });

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_plan_completes_immediately() {
        let stage = MockLink::new();
        let laser = MockLink::new();
        let system = StageSystem::from_links(Config::default(), shared(stage.clone()), shared(laser.clone()));
        let fill = stage_laser::motion::Fill {
            interval: 0.0,
            direction: stage_laser::motion::FillDirection::Vertical,
        };
        let request = system.submit("rectangle, 10, 10", Some(fill)).unwrap();
        let outcome = system.execute(&request, true).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed { segments: 0 });
        assert!(laser.sent().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_can_leave_laser_emitting() {
        let laser = MockLink::new();
        let mut system = StageSystem::from_links(Config::default(), shared(MockLink::new()), shared(laser.clone()));
        system.laser().set_frequency(1000).await.unwrap();
        system.shutdown_with(EmissionOnExit::Keep).await.unwrap();
        assert_eq!(laser.sent(), vec!["1000"]);
        assert!(system.laser().is_emitting());
    }

    #[tokio::test]
    async fn test_shutdown_stops_laser_by_default() {
        let laser = MockLink::new();
        let stage = MockLink::new();
        let mut system = StageSystem::from_links(Config::default(), shared(stage.clone()), shared(laser.clone()));
        system.laser().set_frequency(1000).await.unwrap();
        system.shutdown().await.unwrap();
        assert_eq!(laser.sent(), vec!["1000", "-1"]);
        assert_eq!(stage.sent(), vec!["STOP Emergency"]);
    }

    #[tokio::test]
    async fn test_release_mode_requires_ports() {
        let mut config = Config::default();
        config.mode = stage_laser::Mode::Release;
        assert!(matches!(
            StageSystem::connect(config).await,
            Err(SystemError::Config(_))
        ));
    }
}

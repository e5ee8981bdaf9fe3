// Integration tests for shape planning

#[cfg(test)]
mod tests {
    use stage_laser::motion::planner::{Fill, FillDirection, Shape, plan, travel_time};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_line_single_emitting_segment() {
        let waypoints = plan(&Shape::Line { x: 10.0, y: 20.0 }, 10);
        assert_eq!(waypoints.len(), 1);
        let w = waypoints[0];
        assert_eq!((w.dx, w.dy), (10.0, -20.0));
        assert!(approx(w.delay, 2.0));
        assert!(w.laser_on);
    }

    #[test]
    fn test_line_delay_uses_longer_axis() {
        let waypoints = plan(&Shape::Line { x: -300.0, y: 40.0 }, 100);
        assert!(approx(waypoints[0].delay, 3.0));
    }

    #[test]
    fn test_rectangle_outline_corners() {
        let waypoints = plan(&Shape::Rectangle { x: 10.0, y: 20.0, fill: None }, 10);
        let corners: Vec<(f64, f64)> = waypoints.iter().map(|w| (w.dx, w.dy)).collect();
        assert_eq!(corners, vec![(10.0, 0.0), (10.0, -20.0), (0.0, -20.0), (0.0, 0.0)]);
        assert!(waypoints.iter().all(|w| w.laser_on));
        assert!(approx(travel_time(&waypoints), 60.0 / 10.0));
    }

    #[test]
    fn test_vertical_raster_serpentine() {
        let fill = Fill { interval: 5.0, direction: FillDirection::Vertical };
        let v = 10;
        let waypoints = plan(&Shape::Rectangle { x: 10.0, y: 20.0, fill: Some(fill) }, v);
        assert_eq!(waypoints.len(), 6);

        let offsets: Vec<(f64, f64)> = waypoints.iter().map(|w| (w.dx, w.dy)).collect();
        assert_eq!(
            offsets,
            vec![(0.0, -20.0), (5.0, -20.0), (5.0, 0.0), (10.0, 0.0), (10.0, -20.0), (15.0, -20.0)]
        );

        let flags: Vec<bool> = waypoints.iter().map(|w| w.laser_on).collect();
        assert_eq!(flags, vec![true, false, true, false, true, false]);

        for w in &waypoints {
            let expected = if w.laser_on { 20.0 / 10.0 } else { 5.0 / 10.0 };
            assert!(approx(w.delay, expected));
        }
    }

    #[test]
    fn test_raster_pass_count_follows_interval() {
        let fill = Fill { interval: 3.0, direction: FillDirection::Vertical };
        let waypoints = plan(&Shape::Rectangle { x: 10.0, y: 5.0, fill: Some(fill) }, 1);
        // floor(10 / 3) + 1 passes, each followed by a step.
        assert_eq!(waypoints.len(), 8);
        assert_eq!(waypoints.iter().filter(|w| w.laser_on).count(), 4);
    }

    #[test]
    fn test_non_positive_interval_plans_nothing() {
        for interval in [0.0, -5.0] {
            let fill = Fill { interval, direction: FillDirection::Horizontal };
            assert!(plan(&Shape::Rectangle { x: 10.0, y: 10.0, fill: Some(fill) }, 10).is_empty());
        }
    }

    #[test]
    fn test_planning_is_deterministic() {
        let fill = Fill { interval: 2.5, direction: FillDirection::Horizontal };
        let shape = Shape::Rectangle { x: 40.0, y: 12.0, fill: Some(fill) };
        assert_eq!(plan(&shape, 250), plan(&shape, 250));
    }

    #[test]
    fn test_zero_extent_line_has_zero_delay() {
        let waypoints = plan(&Shape::Line { x: 0.0, y: 0.0 }, 10);
        assert_eq!(waypoints.len(), 1);
        assert_eq!(waypoints[0].delay, 0.0);
    }
}

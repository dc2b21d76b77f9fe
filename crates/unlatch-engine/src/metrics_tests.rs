    use super::*;

    fn snapshot_with(evaluations: u64, gated: u64, actions: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            uptime_secs: 0,
            ticks: evaluations,
            evaluations,
            gated_evaluations: gated,
            actions,
            cleanups: 0,
            coalesced_triggers: 0,
            deferred_cancelled: 0,
        }
    }

    #[test]
    fn test_metrics_new() {
        let metrics = EngineMetrics::new();
        assert_eq!(metrics.ticks.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.uptime_secs(), 0);
    }

    #[test]
    fn test_record_evaluation() {
        let metrics = EngineMetrics::new();
        metrics.record_evaluation(false);
        metrics.record_evaluation(true);
        assert_eq!(metrics.evaluations.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.gated_evaluations.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_snapshot() {
        let metrics = EngineMetrics::new();
        metrics.record_tick();
        metrics.record_action();
        metrics.record_cleanup();
        metrics.record_coalesced(3);
        metrics.record_deferred_cancelled();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ticks, 1);
        assert_eq!(snapshot.actions, 1);
        assert_eq!(snapshot.cleanups, 1);
        assert_eq!(snapshot.coalesced_triggers, 3);
        assert_eq!(snapshot.deferred_cancelled, 1);
    }

    #[test]
    fn test_ratios() {
        let snapshot = snapshot_with(10, 4, 2);
        assert_eq!(snapshot.gated_ratio(), 0.4);
        assert_eq!(snapshot.actions_per_gate(), 0.5);
    }

    #[test]
    fn test_zero_division() {
        let snapshot = snapshot_with(0, 0, 0);
        assert_eq!(snapshot.gated_ratio(), 0.0);
        assert_eq!(snapshot.actions_per_gate(), 0.0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(snapshot_with(1, 1, 1)).unwrap();
        assert_eq!(json["gated_evaluations"], 1);
    }

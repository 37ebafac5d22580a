#[cfg(test)]
mod tests {
    use std::fs;

    use seirmix::database::TotalHistRow;
    use seirmix::report::DestinationPattern;
    use seirmix::{
        run_multiple, CsvSaver, EntitySpec, HealthState, MemorySaver, ModelConfig, SaveWhat,
        SeirMixingModel, SimError,
    };
    use strum::IntoEnumIterator;
    use tempfile::tempdir;

    fn two_group_model() -> SeirMixingModel {
        SeirMixingModel::new(
            "flu",
            1000,
            0.01,
            2.0,
            0.3,
            7.0,
            0.14,
            vec![0.9, 0.1, 0.1, 0.9],
            &[
                EntitySpec::with_size("north", 500),
                EntitySpec::with_size("south", 500),
            ],
        )
        .unwrap()
    }

    #[test]
    fn two_group_scenario_is_reproducible() {
        let mut first = two_group_model();
        let mut second = two_group_model();
        first.run(50, 42).unwrap();
        second.run(50, 42).unwrap();

        assert_eq!(first.database(), second.database());
        assert_eq!(first.database().n_days(), 51);
        for date in 0..=50 {
            let totals = first.database().totals(date).unwrap();
            assert_eq!(totals.iter().sum::<usize>(), 1000);
        }
        let recovered = first.database().series(HealthState::Recovered);
        assert!(recovered.windows(2).all(|pair| pair[0] <= pair[1]));

        let infected = first.database().series(HealthState::Infected);
        let peak_before_day_50 = infected[..50].iter().copied().max().unwrap();
        assert!(peak_before_day_50 > 0);
    }

    #[test]
    fn csv_output_is_independent_of_worker_count() {
        let temp_dir = tempdir().unwrap();
        let one = temp_dir.path().join("one").join("{:03}");
        let four = temp_dir.path().join("four").join("{:03}");
        let model = two_group_model();

        let sequential = CsvSaver::new(one.to_str().unwrap()).unwrap();
        let parallel = CsvSaver::new(four.to_str().unwrap()).unwrap();
        run_multiple(&model, 30, 8, 7, &sequential, true, 1).unwrap();
        run_multiple(&model, 30, 8, 7, &parallel, true, 4).unwrap();

        for replicate in 0..8 {
            for what in SaveWhat::iter() {
                let a = fs::read_to_string(sequential.pattern().path(replicate, what)).unwrap();
                let b = fs::read_to_string(parallel.pattern().path(replicate, what)).unwrap();
                assert_eq!(a, b, "replicate {replicate}, {what}");
            }
        }
    }

    #[test]
    fn stale_outputs_are_removed_before_a_batch() {
        let temp_dir = tempdir().unwrap();
        let pattern = temp_dir.path().join("run-{:02}");
        let saver = CsvSaver::new(pattern.to_str().unwrap()).unwrap();
        let model = two_group_model();

        run_multiple(&model, 5, 5, 0, &saver, true, 2).unwrap();
        run_multiple(&model, 5, 2, 0, &saver, true, 2).unwrap();

        let parsed: DestinationPattern = pattern.to_str().unwrap().parse().unwrap();
        let mut names: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .filter(|name| parsed.matches(name))
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "run-00-generation.csv",
                "run-00-reproductive.csv",
                "run-00-total_hist.csv",
                "run-00-transition.csv",
                "run-00-transmission.csv",
                "run-01-generation.csv",
                "run-01-reproductive.csv",
                "run-01-total_hist.csv",
                "run-01-transition.csv",
                "run-01-transmission.csv",
            ]
        );
    }

    #[test]
    fn failed_save_leaves_no_partial_replicate() {
        let temp_dir = tempdir().unwrap();
        let saver = CsvSaver::new(temp_dir.path().join("run-{:02}").to_str().unwrap()).unwrap();
        fs::create_dir(temp_dir.path().join("run-00-transition.csv")).unwrap();

        let error = run_multiple(&two_group_model(), 5, 2, 0, &saver, true, 1).unwrap_err();
        assert!(
            matches!(error, SimError::ReplicateFailed { replicate: 0, .. }),
            "{error}"
        );
        for what in SaveWhat::iter() {
            let failed = saver.pattern().path(0, what);
            assert!(!failed.is_file(), "{} was left behind", failed.display());
            assert!(saver.pattern().path(1, what).is_file());
        }
    }

    #[test]
    fn zero_contact_rate_has_no_new_exposures() {
        let mut config = ModelConfig::default();
        config.contact_rate = 0.0;
        let model = config.into_model().unwrap();
        let saver = MemorySaver::new();
        run_multiple(&model, 40, 3, 11, &saver, true, 3).unwrap();

        for output in saver.into_outputs().values() {
            assert!(output.database.transmissions().is_empty());
            assert_eq!(
                output.database.series(HealthState::Susceptible),
                vec![990; 41]
            );
        }
    }

    #[test]
    fn total_hist_rows_cover_every_state() {
        let temp_dir = tempdir().unwrap();
        let pattern = temp_dir.path().join("{}");
        let saver =
            CsvSaver::with_tables(pattern.to_str().unwrap(), [SaveWhat::TotalHist]).unwrap();
        run_multiple(&two_group_model(), 3, 1, 5, &saver, true, 1).unwrap();

        let mut reader =
            csv::Reader::from_path(saver.pattern().path(0, SaveWhat::TotalHist)).unwrap();
        let rows: Vec<TotalHistRow> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 4 * 4);
        for (position, row) in rows.iter().enumerate() {
            assert_eq!(row.date, position / 4);
        }
        assert!(!saver.pattern().path(0, SaveWhat::Transition).exists());
    }

    #[test]
    fn invalid_matrix_is_rejected_before_running() {
        let mut config = ModelConfig::default();
        config.contact_matrix = vec![0.9, 0.2, 0.1, 0.9];
        let model = config.into_model().unwrap();
        let saver = MemorySaver::new();
        let error = run_multiple(&model, 10, 4, 0, &saver, true, 2).unwrap_err();
        match error {
            SimError::ConfigError(message) => assert!(message.contains("row 1"), "{message}"),
            other => panic!("unexpected error {other}"),
        }
        assert!(saver.is_empty());
    }
}

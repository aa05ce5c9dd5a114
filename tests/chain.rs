use cowchain::{
    Cow, CowState, CowTraits, HerdPolicy, LifePhase, ModelResult, TransitionModel,
    biology::{body_weight, day_state, dry_matter_intake, milk_production},
};
use std::{collections::HashMap, sync::Arc};

fn cow(phase: LifePhase, dim: u32, ln: u32, dp: u32) -> Cow {
    Cow::new(
        Arc::new(HerdPolicy::default()),
        phase,
        dim,
        ln,
        dp,
        CowTraits {
            age: 1000,
            ..CowTraits::default()
        },
    )
    .expect("failed to construct cow")
}

fn end_to_end_cow() -> Cow {
    let mut cow = cow(LifePhase::Open, 0, 1, 0);
    cow.generate_total_states(Some(400), Some(2))
        .expect("failed to generate states");
    cow
}

#[test]
fn end_to_end_rows_sum_to_one() {
    let cow = end_to_end_cow();
    let space = cow.total_states().unwrap();
    assert!(!space.is_empty());

    let mut row_sums: HashMap<usize, f64> = HashMap::new();
    for edge in cow.generate_edges().unwrap() {
        let edge = edge.expect("edge stream failed");
        assert!((0.0..=1.0).contains(&edge.probability));
        *row_sums.entry(edge.from).or_default() += edge.probability;
    }
    assert_eq!(row_sums.len(), space.len());
    for (from, sum) in row_sums {
        assert!(
            (sum - 1.0).abs() < 1e-9,
            "row {from} ({:?}) sums to {sum}",
            space.states()[from]
        );
    }
}

#[test]
fn generated_states_respect_pregnancy_invariant() {
    let cow = end_to_end_cow();
    let model = cow.transition_model().unwrap();
    for state in cow.total_states().unwrap().states() {
        assert_eq!(
            state.days_pregnant() > 0,
            state.life_phase() == LifePhase::Pregnant
        );
        for next in model.possible_new_states(state).unwrap() {
            assert_eq!(
                next.days_pregnant() > 0,
                next.life_phase() == LifePhase::Pregnant
            );
        }
    }
}

#[test]
fn probabilities_stay_in_unit_interval() {
    let cow = end_to_end_cow();
    let model = cow.transition_model().unwrap();
    for state in cow.total_states().unwrap().states().iter().step_by(7) {
        for next in model.possible_new_states(state).unwrap() {
            let p = model.probability(state, &next).unwrap();
            assert!((0.0..=1.0).contains(&p), "{state:?} -> {next:?}: {p}");
        }
    }
}

#[test]
fn generation_is_deterministic() {
    let a = end_to_end_cow();
    let b = end_to_end_cow();
    assert_eq!(
        a.total_states().unwrap().states(),
        b.total_states().unwrap().states()
    );
}

#[test]
fn biological_models_are_pure() {
    let policy = HerdPolicy::default();
    let state = day_state(&policy, LifePhase::Pregnant, 150, 2, 70).unwrap();
    let bw = body_weight(&state, 1500, policy.voluntary_waiting_period(2));
    assert_eq!(bw, body_weight(&state, 1500, policy.voluntary_waiting_period(2)));
    assert_eq!(dry_matter_intake(&state, bw), dry_matter_intake(&state, bw));
    assert_eq!(state, day_state(&policy, LifePhase::Pregnant, 150, 2, 70).unwrap());
}

#[test]
fn heifer_exits_on_every_day() {
    let mut cow = cow(LifePhase::Open, 0, 0, 0);
    let policy = cow.policy().clone();
    let space = cow.generate_total_states(Some(5), Some(0)).unwrap();

    let exits: Vec<u32> = space
        .states()
        .iter()
        .filter(|s| s.life_phase() == LifePhase::Exit && s.is_heifer())
        .map(|s| s.days_in_milk())
        .collect();
    assert!((0..=5).all(|dim| exits.contains(&dim)));

    let last_open = policy.insemination_cutoff(0) + 1;
    for dim in 0..=last_open {
        let open = day_state(&policy, LifePhase::Open, dim, 0, 0).unwrap();
        assert!(space.contains(&open), "missing heifer Open on day {dim}");
    }

    let model = TransitionModel::new(&policy, space.limits());
    let day_four = day_state(&policy, LifePhase::Open, 4, 0, 0).unwrap();
    let exit = day_state(&policy, LifePhase::Exit, 5, 0, 0).unwrap();
    assert!(model.possible_new_states(&day_four).unwrap().contains(&exit));
}

#[test]
fn heifer_only_chain_is_complete() {
    let mut cow = cow(LifePhase::Open, 0, 0, 0);
    let space = cow.generate_total_states(Some(5), Some(0)).unwrap();
    assert!(
        space
            .states()
            .iter()
            .any(|s| s.life_phase() == LifePhase::DoNotBreed && s.lactation_number() == 1)
    );

    let mut row_sums: HashMap<usize, f64> = HashMap::new();
    for edge in cow.generate_edges().unwrap() {
        let edge = edge.expect("edge stream failed");
        *row_sums.entry(edge.from).or_default() += edge.probability;
    }
    let space = cow.total_states().unwrap();
    assert_eq!(row_sums.len(), space.len());
    for (from, sum) in row_sums {
        assert!(
            (sum - 1.0).abs() < 1e-9,
            "row {from} ({:?}) sums to {sum}",
            space.states()[from]
        );
    }
}

#[test]
fn calving_probability() {
    let policy = HerdPolicy::default();
    let model = TransitionModel::new(&policy, end_to_end_cow().total_states().unwrap().limits());
    let gestation = policy.days_pregnant_limit(1);
    let pregnant = day_state(&policy, LifePhase::Pregnant, 380, 1, gestation).unwrap();
    let calf = day_state(&policy, LifePhase::Open, 0, 2, 0).unwrap();

    let successors = model.possible_new_states(&pregnant).unwrap();
    let opens: Vec<&CowState> = successors
        .iter()
        .filter(|s| s.life_phase() == LifePhase::Open)
        .collect();
    assert_eq!(opens, vec![&calf]);

    let p = model.probability(&pregnant, &calf).unwrap();
    assert!((p - (1.0 - 0.05 / 365.0)).abs() < 1e-15);
}

#[test]
fn low_yield_forces_exit() -> ModelResult<()> {
    let policy = HerdPolicy {
        milk_threshold: 30.0,
        ..HerdPolicy::default()
    };
    let limits = cowchain::GenerationLimits {
        days_in_milk_limit: 1000,
        lactation_number_limit: 3,
        days_pregnant_limit: 282,
    };
    let model = TransitionModel::new(&policy, limits);
    let state = CowState::new(LifePhase::Open, 100, 2, 0, 12.0)?;
    let successors = model.possible_new_states(&state)?;
    assert_eq!(successors[0].life_phase(), LifePhase::Exit);
    assert_eq!(model.probability(&state, &successors[0])?, 1.0);
    let others: f64 = successors[1..]
        .iter()
        .map(|s| model.probability(&state, s))
        .sum::<ModelResult<f64>>()?;
    assert_eq!(others, 0.0);
    Ok(())
}

#[test]
fn no_milk_when_dry_heifer_or_exited() {
    let policy = HerdPolicy::default();
    let milkbot = cowchain::MilkBot::for_lactation(2);
    let dry_off = policy.dry_off_day(2);
    for dim in [0, 50, 250, 600] {
        assert_eq!(
            milk_production(&cowchain::MilkBot::for_lactation(0), LifePhase::Open, dim, 0, 0, dry_off),
            0.0
        );
        assert_eq!(milk_production(&milkbot, LifePhase::Exit, dim, 2, 0, dry_off), 0.0);
        assert_eq!(
            milk_production(&milkbot, LifePhase::Pregnant, dim, 2, dry_off, dry_off),
            0.0
        );
    }
}

#[test]
fn initial_vector_points_at_current_state() {
    let cow = end_to_end_cow();
    let vector = cow.initial_state_vector().unwrap();
    let hot: Vec<usize> = vector
        .iter()
        .enumerate()
        .filter(|(_, p)| **p == 1.0)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(hot.len(), 1);
    assert_eq!(
        &cow.total_states().unwrap().states()[hot[0]],
        cow.current_state()
    );
}

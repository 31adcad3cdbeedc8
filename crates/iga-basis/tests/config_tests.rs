use iga_basis::{EndBehaviour, InteriorReg, ReferenceBasis, SpaceConfig};
use iga_core::IgaError;

#[test]
fn test_parse_full_config() {
    let json = r#"{
        "knots": [[0.0, 0.5, 1.0], [0.0, 1.0, 2.0]],
        "degrees": [[2, 1]],
        "regularity": "minimum",
        "end_behaviour": [["interpolatory", "periodic"]],
        "tolerance": { "absolute": 1e-12, "relative": 1e-10 }
    }"#;
    let cfg: SpaceConfig = serde_json::from_str(json).unwrap();
    assert_eq!(cfg.regularity, Some(InteriorReg::Minimum));
    assert_eq!(
        cfg.end_behaviour,
        Some(vec![vec![EndBehaviour::Interpolatory, EndBehaviour::Periodic]])
    );

    let space = cfg.build::<2>().unwrap();
    // direction 0: one interior knot of multiplicity 2; direction 1 is periodic
    assert_eq!(space.spline_space().num_basis_table()[0].as_array(), [5, 2]);
    assert_eq!(space.num_basis(), 10);
}

#[test]
fn test_end_knots_round_trip_through_json() {
    let json = r#"{
        "uniform_knots": [3],
        "degrees": [[2]],
        "end_behaviour": [[{ "end_knots": { "left": [-0.2, -0.1, 0.0], "right": [1.0, 1.1, 1.3] } }]]
    }"#;
    let cfg: SpaceConfig = serde_json::from_str(json).unwrap();
    let space = cfg.build::<1>().unwrap();
    assert_eq!(space.num_basis(), 4);
    let knots = &space.spline_space().knots_with_repetition()[0][0];
    assert_eq!(knots, &vec![-0.2, -0.1, 0.0, 0.5, 1.0, 1.1, 1.3]);

    let back: SpaceConfig = serde_json::from_str(&serde_json::to_string(&cfg).unwrap()).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn test_unknown_field_rejected() {
    let json = r#"{ "uniform_knots": [3], "degrees": [[1]], "cache_flags": ["value"] }"#;
    assert!(serde_json::from_str::<SpaceConfig>(json).is_err());
}

#[test]
fn test_bad_multiplicity_reported() {
    let json = r#"{
        "uniform_knots": [4],
        "degrees": [[2]],
        "multiplicities": [[[1, 3]]]
    }"#;
    let cfg: SpaceConfig = serde_json::from_str(json).unwrap();
    assert!(matches!(cfg.build::<1>(), Err(IgaError::Configuration(_))));
}

#[test]
fn test_component_count_checked() {
    let json = r#"{
        "uniform_knots": [3, 3],
        "degrees": [[1, 1], [2, 2]],
        "multiplicities": [[[1], [1]]]
    }"#;
    let cfg: SpaceConfig = serde_json::from_str(json).unwrap();
    assert!(matches!(
        cfg.build::<2>(),
        Err(IgaError::DimensionMismatch { expected: 2, found: 1, .. })
    ));
}

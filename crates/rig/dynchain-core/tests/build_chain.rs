use approx::assert_abs_diff_eq;
use dynchain_core::memory::MemoryScene;
use dynchain_core::scene::matrix_translation;
use dynchain_core::{
    build_dynamic_chain, BuildError, DynChainConfig, DynamicChain, NodeKind, Plug, SceneError,
    SceneStore, SkipReason,
};
use dynchain_test_fixtures::scenes;
use nalgebra::Vector3;

const EPS: f64 = 1e-6;

fn build(name: &str) -> (MemoryScene, DynamicChain) {
    let mut scene = scenes::load(name).expect("fixture scene");
    let chain = build_dynamic_chain(&mut scene, &DynChainConfig::default()).expect("build ok");
    (scene, chain)
}

#[test]
fn every_controller_feeds_its_own_control_point() {
    let (scene, chain) = build("straight-chain");
    assert_eq!(chain.len(), 4);
    assert_eq!(chain.drivers.len(), 4);
    assert_eq!(scene.connected_indices(chain.input_curve, "controlPoints"), vec![0, 1, 2, 3]);
    for (i, (&driver, &ctrl)) in chain.drivers.iter().zip(&chain.controls).enumerate() {
        assert_eq!(
            scene.source_of(&Plug::element(chain.input_curve, "controlPoints", i as u32)),
            Some(&Plug::new(driver, "outputTranslate"))
        );
        assert_eq!(
            scene.source_of(&Plug::new(driver, "inputMatrix")),
            Some(&Plug::element(ctrl, "worldMatrix", 0))
        );
    }
}

#[test]
fn follicle_upgrade_starts_at_four_controls() {
    let (scene, three) = build("three-link");
    assert!(!three.cubic_follicle);
    assert_eq!(scene.value(&Plug::new(three.follicle, "degree")), None);

    let (scene, four) = build("straight-chain");
    assert!(four.cubic_follicle);
    let degree = scene.value(&Plug::new(four.follicle, "degree")).map(|v| v.as_f64());
    assert_eq!(degree, Some(3.0));
}

#[test]
fn a_single_transform_builds_nothing() {
    let mut scene = scenes::load("single-control").expect("fixture scene");
    let nodes = scene.node_count();
    let connections = scene.connection_count();
    let err = build_dynamic_chain(&mut scene, &DynChainConfig::default()).unwrap_err();
    assert_eq!(err, BuildError::Configuration { found: 1 });
    assert_eq!(scene.node_count(), nodes);
    assert_eq!(scene.connection_count(), connections);
}

#[test]
fn non_transforms_are_skipped_in_order() {
    let (scene, chain) = build("mixed-selection");
    assert_eq!(chain.len(), 3);
    let names: Vec<String> = chain
        .controls
        .iter()
        .map(|&c| scene.node_name(c).unwrap())
        .collect();
    assert_eq!(names, ["chain_0", "chain_1", "chain_2"]);

    let skipped: Vec<(&str, SkipReason)> = chain
        .skipped
        .iter()
        .map(|s| (s.name.as_str(), s.reason))
        .collect();
    assert_eq!(
        skipped,
        [
            ("chainShader", SkipReason::NotDag),
            ("chainProxyShape", SkipReason::NotTransform)
        ]
    );
}

#[test]
fn input_curve_knots_fit_the_host_curve_primitive() {
    for name in ["straight-chain", "three-link", "two-link"] {
        let (scene, chain) = build(name);
        let curve = scene
            .evaluate_plug(&Plug::element(chain.input_curve, "worldSpace", 0))
            .unwrap()
            .into_curve()
            .unwrap();
        let host = curve.knots.host_knots();
        assert_eq!(host.len(), curve.cvs.len() + curve.degree - 1, "{name}");
        assert_eq!(host, &curve.knots.as_slice()[1..curve.knots.len() - 1]);
        assert_eq!(host.first(), Some(&0.0));
        assert_eq!(host.last(), Some(&((curve.cvs.len() - curve.degree) as f64)));
    }
}

#[test]
fn frames_chain_from_the_root_controller_to_the_tangent_tip() {
    let (scene, chain) = build("straight-chain");
    let n = chain.frames.len();

    let first_side = chain.frames[0].side;
    assert_eq!(
        scene.source_of(&Plug::new(first_side, "matrix")),
        Some(&Plug::element(chain.controls[0], "worldMatrix", 0))
    );
    for i in 1..n {
        assert_eq!(
            scene.source_of(&Plug::new(chain.frames[i].side, "matrix")),
            Some(&Plug::element(chain.frames[i - 1].locator, "worldMatrix", 0)),
            "frame {i}"
        );
    }

    for frame in &chain.frames[..n - 1] {
        let segment = frame.segment.expect("interior frames read a segment");
        assert_eq!(
            scene.source_of(&Plug::new(frame.matrix, "in00")),
            Some(&Plug::new(segment, "output3Dx"))
        );
    }
    let tip = chain.frames[n - 1];
    assert!(tip.segment.is_none());
    assert_eq!(
        scene.source_of(&Plug::new(tip.matrix, "in00")),
        Some(&Plug::new(tip.sampler, "tangentX"))
    );
    assert_eq!(scene.nodes_of_kind(NodeKind::PlusMinusAverage).len(), n - 1);
}

#[test]
fn rest_pose_locators_sit_on_the_controllers() {
    for name in ["straight-chain", "three-link", "two-link"] {
        let (scene, chain) = build(name);
        for (frame, expected) in chain.frames.iter().zip(&chain.positions) {
            let world = scene.world_matrix(frame.locator).unwrap();
            assert_abs_diff_eq!(matrix_translation(&world).coords, expected.coords, epsilon = EPS);
        }
    }
}

#[test]
fn straight_chain_along_x_has_no_rotation() {
    let (scene, chain) = build("straight-chain");
    for frame in &chain.frames {
        let rotate = scene.evaluate_vec3(&Plug::new(frame.locator, "rotate")).unwrap();
        assert_abs_diff_eq!(rotate, Vector3::zeros(), epsilon = EPS);
    }
}

#[test]
fn root_roll_propagates_down_the_chain() {
    let (scene, chain) = build("rolled-root");
    for frame in &chain.frames {
        let rotate = scene.evaluate_vec3(&Plug::new(frame.locator, "rotate")).unwrap();
        assert_abs_diff_eq!(rotate, Vector3::new(90.0, 0.0, 0.0), epsilon = EPS);
    }
}

#[test]
fn diagonal_chain_turns_the_locators() {
    let (scene, chain) = build("two-link");
    // forward along +X+Z with the root's +Y as side: a -45 degree turn about Y
    for frame in &chain.frames {
        let rotate = scene.evaluate_vec3(&Plug::new(frame.locator, "rotate")).unwrap();
        assert_abs_diff_eq!(rotate, Vector3::new(0.0, -45.0, 0.0), epsilon = EPS);
    }
}

#[test]
fn parameters_come_from_the_input_curve() {
    let (scene, chain) = build("straight-chain");
    let params: Vec<f64> = chain.frames.iter().map(|f| f.parameter).collect();
    assert!(params[0].abs() < EPS);
    assert!((params[3] - 2.0).abs() < EPS);
    assert!(params.windows(2).all(|w| w[0] < w[1]));
    for frame in &chain.frames {
        let stored = scene
            .value(&Plug::new(frame.sampler, "parameter"))
            .map(|v| v.as_f64());
        assert_eq!(stored, Some(frame.parameter));
    }
}

#[test]
fn missing_hair_system_fails_during_the_flush() {
    let mut scene = scenes::load("three-link")
        .expect("fixture scene")
        .without_node_type(NodeKind::HairSystem);
    let err = build_dynamic_chain(&mut scene, &DynChainConfig::default()).unwrap_err();
    match err {
        BuildError::Flush { source, .. } => {
            assert_eq!(source, SceneError::UnknownNodeType("hairSystem".into()));
        }
        other => panic!("expected a flush failure, got {other:?}"),
    }
    // partial graph stays behind
    assert_eq!(scene.nodes_of_kind(NodeKind::Follicle).len(), 1);
    assert!(scene.nodes_of_kind(NodeKind::HairSystem).is_empty());
}

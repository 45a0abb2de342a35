//! Integration tests for end-to-end field resolution.
//!
//! Containers over synthetic in-memory datasets: bulk reads, derived and
//! spatial generation, particle assembly, filters and scoped state.

use std::sync::Arc;

use fieldscope_engine::{
    Center, ChunkKind, ChunkOptions, ContainerRegistry, EngineConfig, Error, FieldData, FieldInfo, FieldKey,
    FieldParameters, FieldSpec, MemoryIndex, ParticleFilter, Result, SelectionContainer, UnitArray,
};
use fieldscope_tests::{PARTICLE_MASS, TestHarness, density, smooth, standard_fields};
use serde_json::json;

fn key(category: &str, name: &str) -> FieldKey {
    FieldKey::new(category, name)
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "length of {actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
    }
}

// ============================================================================
// Access protocol
// ============================================================================

#[test]
fn test_derived_field_from_raw() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    let a = container.field("a").unwrap();
    let expected: Vec<f64> = (0..10).map(|i| 2.0 * i as f64).collect();
    assert_eq!(a.values(), expected.as_slice());

    // the raw dependency was read and pruned again
    assert_eq!(container.keys(), vec![key("gas", "a")]);
}

#[test]
fn test_retained_dependencies() {
    let config = EngineConfig {
        retain_dependencies: true,
        ..EngineConfig::default()
    };
    let harness = TestHarness::line(10, 2, config);
    let mut container = harness.all();

    container.get_data(["a"]).unwrap();
    assert!(container.has_field(&key("gas", "a")));
    assert!(container.has_field(&key("gas", "b")));
}

#[test]
fn test_type_mismatch_leaves_store_unchanged() {
    let harness = TestHarness::standard();
    let mut container = harness.all();
    container.get_data([("gas", "b")]).unwrap();
    let before = container.keys();

    let err = container.get_data([("io", "density")]).unwrap_err();
    assert!(matches!(err, Error::FieldTypeMismatch { expected: "fluid", .. }));

    let err = container.get_data([("gas", "particle_mass")]).unwrap_err();
    assert!(matches!(err, Error::FieldTypeMismatch { expected: "particle", .. }));

    assert_eq!(container.keys(), before);
}

#[test]
fn test_unknown_and_malformed_specifiers() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    assert!(matches!(container.field("nonexistent"), Err(Error::FieldNotFound(_))));

    let spec = FieldSpec::from_json(&json!(["gas", "density", "extra"])).unwrap();
    assert!(matches!(container.field(spec), Err(Error::FieldNotParseable(_))));
    assert!(matches!(FieldSpec::from_json(&json!(3)), Err(Error::FieldNotParseable(_))));
    assert!(container.keys().is_empty());
}

#[test]
fn test_repeated_access_returns_same_array() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    let first = container.field("a").unwrap();
    let reads = harness.reads().len();
    let second = container.field(("gas", "a")).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(harness.reads().len(), reads);
}

#[test]
fn test_dependency_closure_read_in_one_pass() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    let c = container.field("c").unwrap();
    let expected: Vec<f64> = (0..10).map(|i| 3.0 * i as f64).collect();
    assert_eq!(c.values(), expected.as_slice());

    let reads = harness.reads();
    assert_eq!(reads.len(), 1, "unexpected reads: {reads:?}");
    assert!(reads[0].contains(&key("gas", "b")));
    assert!(reads[0].contains(&key("gas", "a")));
    assert_eq!(container.keys(), vec![key("gas", "c")]);
}

#[test]
fn test_output_units_applied_on_read() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    let velocity = container.field("velocity_x").unwrap();
    assert_eq!(velocity.units(), "cm/s");
    assert_eq!(velocity.values()[3], 3.0e5);
}

#[test]
fn test_selection_limits_reads() {
    let harness = TestHarness::standard();
    let mut container = harness.slab(0.2, 0.7);

    assert_eq!(container.size().unwrap(), 5);
    let b = container.field("b").unwrap();
    assert_eq!(b.values(), &[2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_set_and_remove_fields() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    container.set_field(("gas", "custom"), UnitArray::dimensionless(vec![1.0, 2.0]));
    assert!(container.has_field(&key("gas", "custom")));
    // not a registered field, so it cannot be resolved by specifier
    assert!(container.field(("gas", "custom")).is_err());

    container.get_data(["b"]).unwrap();
    let removed = container.remove_field("b").unwrap();
    assert!(removed.is_some());
    assert!(!container.has_field(&key("gas", "b")));

    let removed = container.remove_field(("gas", "custom")).unwrap();
    assert_eq!(removed.unwrap().values(), &[1.0, 2.0]);

    container.get_data(["a"]).unwrap();
    container.clear_data();
    assert!(container.keys().is_empty());
}

// ============================================================================
// Generation
// ============================================================================

#[test]
fn test_generation_failure_propagates_and_unlocks() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    let err = container.get_data(["broken"]).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(!container.is_locked());
    assert_eq!(container.data().current_fluid_type(), "gas");
}

#[test]
fn test_circular_dependency_detected() {
    let index = MemoryIndex::builder([4, 1, 1])
        .fluid(("gas", "b"), vec![1.0; 4])
        .build()
        .unwrap();
    let harness = TestHarness::with_fields(index, |builder| {
        builder
            .field(FieldInfo::on_disk(key("gas", "b"), ""))
            .field(
                FieldInfo::derived(key("gas", "x"), "", |c| {
                    let y = c.field("y")?;
                    Ok(Some(y.values().to_vec().into()))
                })
                .depends_on(["y"]),
            )
            .field(
                FieldInfo::derived(key("gas", "y"), "", |c| {
                    let x = c.field("x")?;
                    Ok(Some(x.values().to_vec().into()))
                })
                .depends_on(["x"]),
            )
            .field(FieldInfo::derived(key("gas", "z"), "", |c| {
                let z = c.field("z")?;
                Ok(Some(z.values().to_vec().into()))
            }))
    });
    let mut container = harness.all();

    match container.get_data(["x"]) {
        Err(Error::CircularDependency { fields }) => {
            assert!(fields.contains(&key("gas", "x")));
            assert!(fields.contains(&key("gas", "y")));
        }
        other => panic!("expected a circular dependency, got {other:?}"),
    }
    assert!(!container.is_locked());

    assert!(matches!(
        container.get_data(["z"]),
        Err(Error::CircularDependency { .. })
    ));
}

#[test]
fn test_undiscovered_dependency_generated_on_demand() {
    let index = MemoryIndex::builder([4, 1, 1])
        .fluid(("gas", "b"), vec![1.0, 2.0, 3.0, 4.0])
        .build()
        .unwrap();
    let harness = TestHarness::with_fields(index, |builder| {
        builder.field(FieldInfo::on_disk(key("gas", "b"), "")).field(
            FieldInfo::derived(key("gas", "tripled"), "", |c| {
                let b = c.field("b")?;
                Ok(Some(b.values().iter().map(|v| 3.0 * v).collect::<Vec<_>>().into()))
            })
            .discover_dependencies(|_| Err(Error::InvalidArgument("discovery unavailable".to_string()))),
        )
    });
    let mut container = harness.all();

    let tripled = container.field("tripled").unwrap();
    assert_eq!(tripled.values(), &[3.0, 6.0, 9.0, 12.0]);
    assert_eq!(container.keys(), vec![key("gas", "tripled")]);
}

#[test]
fn test_generator_without_result_fails() {
    let index = MemoryIndex::builder([4, 1, 1])
        .fluid(("gas", "density"), density(4))
        .build()
        .unwrap();
    let harness = TestHarness::with_fields(index, |builder| {
        builder
            .field(FieldInfo::on_disk(key("gas", "density"), "g/cm**3"))
            .field(FieldInfo::on_disk(key("gas", "pressure"), ""))
            .field(FieldInfo::derived(key("gas", "empty"), "", |_| Ok(None)))
    });
    let mut container = harness.all();

    assert!(matches!(
        container.field("empty"),
        Err(Error::CouldNotGenerateField(field)) if field == key("gas", "empty")
    ));
    // registered as on disk but absent from storage
    assert!(matches!(
        container.field("pressure"),
        Err(Error::CouldNotGenerateField(field)) if field == key("gas", "pressure")
    ));
    assert!(!container.is_locked());
    assert_eq!(container.field("density").unwrap().len(), 4);
}

#[test]
fn test_locked_container_defers_requests() {
    let harness = TestHarness::standard();
    let mut container = harness.all();
    container.get_data(["b"]).unwrap();

    {
        let mut locked = container.field_lock();
        // cached fields are still served
        assert!(locked.field("b").is_ok());
        let err = locked.get_data(["a"]).unwrap_err();
        assert!(err.is_generation_in_progress());
    }
    assert!(!container.is_locked());
    assert!(container.field("a").is_ok());
}

// ============================================================================
// Spatial fields
// ============================================================================

#[test]
fn test_ghost_zone_stitching_matches_unsplit() {
    let expected = smooth(&density(10));
    for split in [1, 2, 3, 5] {
        let harness = TestHarness::line(10, split, EngineConfig::default());
        let mut container = harness.all();
        let smoothed = container.field("smoothed").unwrap();
        assert_close(smoothed.values(), &expected);
    }
}

#[test]
fn test_ghost_zone_stitching_respects_selection() {
    let expected = smooth(&density(10));
    let harness = TestHarness::line(10, 3, EngineConfig::default());
    let mut container = harness.slab(0.2, 0.7);

    let smoothed = container.field("smoothed").unwrap();
    assert_close(smoothed.values(), &expected[2..7]);
}

#[test]
fn test_ghost_zones_unavailable_in_unpadded_chunk() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    let result = container.chunks(&[], ChunkKind::Spatial, ChunkOptions::default(), |block| {
        block.field("smoothed").map(|_| ())
    });
    assert!(matches!(
        result,
        Err(Error::GhostZonesUnavailable { required: 1, available: 0, .. })
    ));
    assert!(container.keys().is_empty());
    assert!(!container.is_locked());
}

#[test]
fn test_spatial_field_without_ghost_zones() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    let scaled = container.field("density_per_block").unwrap();
    let expected: Vec<f64> = density(10)
        .iter()
        .enumerate()
        .map(|(i, d)| if i < 5 { *d } else { 2.0 * d })
        .collect();
    assert_close(scaled.values(), &expected);
}

#[test]
fn test_block_geometry() {
    let harness = TestHarness::standard();
    let mut container = harness.slab(0.4, 0.6);

    let centers = container.fcoords().unwrap();
    assert_eq!(centers.len(), 2);
    assert!((centers[0][0] - 0.45).abs() < 1e-12);
    assert_eq!(container.icoords().unwrap(), vec![[4, 0, 0], [5, 0, 0]]);
    assert!((container.fwidth().unwrap()[1][0] - 0.1).abs() < 1e-12);
    assert_eq!(container.ires().unwrap(), vec![0, 0]);

    let mut visited = Vec::new();
    container
        .for_each_block(|block, mask| {
            visited.push((block.id.0, mask.iter().filter(|&&keep| keep).count()));
            Ok(())
        })
        .unwrap();
    assert_eq!(visited, vec![(0, 1), (1, 1)]);
}

// ============================================================================
// Particles
// ============================================================================

#[test]
fn test_particle_read_and_derived() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    let mass = container.field("particle_mass").unwrap();
    assert_eq!(mass.values(), &PARTICLE_MASS);

    let doubled = container.field("particle_double_mass").unwrap();
    assert_eq!(doubled.values(), &[2.0, 4.0, 6.0, 8.0, 10.0, 12.0]);
}

#[test]
fn test_particle_assembly_matches_count() {
    let harness = TestHarness::standard();
    let mut container = harness.slab(0.4, 1.0);

    assert_eq!(container.count_particles("io").unwrap(), 4);
    let blocks = container.field(("io", "particle_block")).unwrap();
    assert_eq!(blocks.values(), &[0.0, 1.0, 1.0, 1.0]);

    let mass = container.field(("io", "particle_mass")).unwrap();
    assert_eq!(mass.values(), &[3.0, 4.0, 5.0, 6.0]);
    assert_eq!(container.count_particles("io").unwrap(), 4);
}

#[test]
fn test_particle_count_mismatch_detected() {
    let harness = TestHarness::standard();
    let mut container = harness.all();
    // a cached array of the category sets the expected particle count
    container.set_field(("io", "particle_mass"), UnitArray::new(vec![0.0; 10], "g"));

    assert!(matches!(
        container.get_data([("io", "particle_block")]),
        Err(Error::ParticleCountMismatch { counted: 10, filled: 6, .. })
    ));
    assert!(!container.is_locked());
}

#[test]
fn test_particle_ghost_zones_rejected() {
    let harness = TestHarness::with_fields(
        MemoryIndex::builder([4, 1, 1])
            .particles("io", "particle_position_x", vec![0.5])
            .particles("io", "particle_position_y", vec![0.5])
            .particles("io", "particle_position_z", vec![0.5])
            .build()
            .unwrap(),
        |builder| {
            builder.field(
                FieldInfo::derived(key("io", "particle_smoothed"), "", |_| Ok(Some(vec![0.0].into())))
                    .particle()
                    .spatial(2),
            )
        },
    );
    let mut container = harness.all();

    assert!(matches!(
        container.get_data([("io", "particle_smoothed")]),
        Err(Error::ParticleGhostZonesUnsupported { ghost_zones: 2, .. })
    ));
}

#[test]
fn test_particle_filter() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    let heavy = container.field(("heavy", "particle_mass")).unwrap();
    assert_eq!(heavy.values(), &[3.0, 4.0, 5.0, 6.0]);

    let doubled = container.field(("heavy", "particle_double_mass")).unwrap();
    assert_eq!(doubled.values(), &[6.0, 8.0, 10.0, 12.0]);
    assert!(container.has_field(&key("heavy", "particle_mass")));
}

#[test]
fn test_filtered_request_keeps_only_requested_fields() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    let doubled = container.field(("heavy", "particle_double_mass")).unwrap();
    assert_eq!(doubled.values(), &[6.0, 8.0, 10.0, 12.0]);
    assert_eq!(container.keys(), vec![key("heavy", "particle_double_mass")]);

    // a later filtered request leaves earlier arrays untouched
    let mass = container.field(("heavy", "particle_mass")).unwrap();
    let again = container.field(("heavy", "particle_double_mass")).unwrap();
    assert!(Arc::ptr_eq(&doubled, &again));
    assert_eq!(mass.values(), &[3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_ill_defined_filter() {
    let index = MemoryIndex::builder([4, 1, 1])
        .fluid(("gas", "density"), density(4))
        .fluid(("gas", "b"), vec![0.0; 4])
        .fluid(("gas", "velocity_x"), vec![0.0; 4])
        .particles("io", "particle_position_x", vec![0.1, 0.6])
        .particles("io", "particle_position_y", vec![0.5, 0.5])
        .particles("io", "particle_position_z", vec![0.5, 0.5])
        .particles("io", "particle_mass", vec![1.0, 3.0])
        .build()
        .unwrap();
    let harness = TestHarness::with_fields(index, |builder| {
        standard_fields(builder).particle_filter(ParticleFilter::new("lopsided", "io", |_| Ok(vec![true])))
    });
    let mut container = harness.all();

    assert!(matches!(
        container.field(("lopsided", "particle_mass")),
        Err(Error::IllDefinedFilter { field_len: 2, mask_len: 1, .. })
    ));
}

// ============================================================================
// Container state
// ============================================================================

#[test]
fn test_container_fields() {
    let harness = TestHarness::standard();
    let mut container = harness.all().with_container_field("ones", "", |c| Ok(vec![1.0; c.size()?]));

    let ones = container.field("ones").unwrap();
    assert_eq!(ones.len(), 10);
    let again = container.field(("index", "ones")).unwrap();
    assert!(Arc::ptr_eq(&ones, &again));
}

#[test]
fn test_field_parameters() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    container.set_field_parameter("center", UnitArray::new(vec![3.0, 0.0, 0.0], "cm"));

    let offset = container.field("offset_b").unwrap();
    assert_eq!(offset.values()[0], -3.0);
    assert_eq!(offset.values()[9], 6.0);
}

#[test]
fn test_field_parameter_overlay_is_scoped() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    let mut incoming = FieldParameters::new();
    incoming.set("axis", UnitArray::dimensionless(vec![1.0]));
    {
        let scope = container.with_field_parameters(&incoming);
        assert!(scope.has_field_parameter("axis"));
        assert!(scope.has_field_parameter("center"));
    }
    assert!(!container.has_field_parameter("axis"));
}

#[test]
fn test_chunked_read_restores_state() {
    let harness = TestHarness::standard();
    let mut container = harness.all();
    container.get_data(["b"]).unwrap();
    let chunk = container.current_chunk().cloned().unwrap();

    {
        let mut scope = container.chunked_read(chunk);
        assert!(scope.field_data().is_empty());
        scope.get_data(["a"]).unwrap();
        assert!(scope.get_data(["broken"]).is_err());
    }

    assert_eq!(container.keys(), vec![key("gas", "b")]);
    assert!(!container.is_locked());
    assert!(container.current_chunk().is_some());
}

#[test]
fn test_cache_activation_is_scoped() {
    let harness = TestHarness::standard();
    let mut container = harness.all();
    container.set_field(("gas", "b"), UnitArray::dimensionless(vec![7.0]));

    let cache = [(key("gas", "b"), UnitArray::dimensionless(vec![1.0]))]
        .into_iter()
        .collect();
    container.initialize_cache(cache);
    {
        let scope = container.activate_cache();
        assert_eq!(scope.field_data().get(&key("gas", "b")).unwrap().values(), &[1.0]);
    }
    assert_eq!(container.field_data().get(&key("gas", "b")).unwrap().values(), &[7.0]);
}

#[test]
fn test_cache_scope_discards_fields_materialized_inside() {
    let harness = TestHarness::standard();
    let mut container = harness.all();
    let density = container.field("density").unwrap();

    let cache: FieldData = [(key("gas", "velocity_x"), UnitArray::new(vec![0.0; 10], "cm/s"))]
        .into_iter()
        .collect();
    container.initialize_cache(cache);
    {
        let mut scope = container.activate_cache();
        scope.get_data(["b"]).unwrap();
        assert!(scope.has_field(&key("gas", "b")));
        assert!(scope.has_field(&key("gas", "velocity_x")));
    }

    assert_eq!(container.keys(), vec![key("gas", "density")]);
    assert!(Arc::ptr_eq(&density, &container.field("density").unwrap()));
}

fn fail_under_scopes(container: &mut SelectionContainer) -> Result<()> {
    let mut cached = container.activate_cache();
    cached.get_data(["b"])?;
    let mut typed = cached.field_type_state("dust", false);
    typed.get_data([("gas", "broken")])?;
    Ok(())
}

#[test]
fn test_scopes_restore_when_left_through_error() {
    let harness = TestHarness::standard();
    let mut container = harness.all();
    container.get_data(["density"]).unwrap();
    let cache: FieldData = [(key("gas", "a"), UnitArray::dimensionless(vec![1.0; 10]))]
        .into_iter()
        .collect();
    container.initialize_cache(cache);

    assert!(matches!(fail_under_scopes(&mut container), Err(Error::InvalidArgument(_))));

    assert_eq!(container.keys(), vec![key("gas", "density")]);
    assert_eq!(container.data().current_fluid_type(), "gas");
    assert!(!container.is_locked());
    // the cache was consumed by the failed scope
    {
        let scope = container.activate_cache();
        assert!(!scope.has_field(&key("gas", "a")));
    }
}

#[test]
fn test_chunk_iteration_fetches_per_chunk() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    let mut sizes = Vec::new();
    container
        .chunks(
            &[FieldSpec::from("b")],
            ChunkKind::Io,
            ChunkOptions::default(),
            |chunk| {
                let b = chunk.field("b")?;
                sizes.push(b.len());
                Ok(())
            },
        )
        .unwrap();
    assert_eq!(sizes, vec![10]);
    assert!(container.keys().is_empty());
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_registry_creates_containers() {
    let harness = TestHarness::standard();
    let registry = ContainerRegistry::new();

    let mut region = registry
        .create(
            "region",
            harness.dataset(),
            &json!({"left": [0.0, 0.0, 0.0], "right": [0.5, 1.0, 1.0]}),
        )
        .unwrap();
    assert_eq!(region.size().unwrap(), 5);

    let mut all = registry.create("all", harness.dataset(), &json!(null)).unwrap();
    assert_eq!(all.field("b").unwrap().len(), 10);

    assert!(matches!(
        registry.create("sphere", harness.dataset(), &json!({})),
        Err(Error::UnknownContainerType(name)) if name == "sphere"
    ));
}

// ============================================================================
// Centers, cut regions and export
// ============================================================================

fn center_of(container: &SelectionContainer) -> Vec<f64> {
    container.get_field_parameter("center").unwrap().values().to_vec()
}

#[test]
fn test_center_resolution() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    container.set_center(Center::Domain).unwrap();
    assert_close(&center_of(&container), &[0.5, 0.5, 0.5]);
    assert_eq!(container.get_field_parameter("center").unwrap().units(), "cm");

    container.set_center(Center::parse("max").unwrap()).unwrap();
    assert_close(&center_of(&container), &[0.95, 0.5, 0.5]);

    container.set_center(Center::parse("max_particle_mass").unwrap()).unwrap();
    assert_close(&center_of(&container), &[0.95, 0.5, 0.5]);

    container
        .set_center(Center::Tagged(UnitArray::new(vec![0.002, 0.0, 0.0], "m")))
        .unwrap();
    assert_close(&center_of(&container), &[0.2, 0.0, 0.0]);
    let offset = container.field("offset_b").unwrap();
    assert_close(&offset.values()[..2], &[-0.2, 0.8]);

    assert!(matches!(
        container.set_center(Center::Tagged(UnitArray::new(vec![1.0, 2.0], "cm"))),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_find_max_respects_selection() {
    let harness = TestHarness::standard();
    let mut slab = harness.slab(0.2, 0.7);

    let (value, location) = slab.find_max("density").unwrap();
    assert_eq!(value, 37.0);
    assert_close(&location, &[0.65, 0.5, 0.5]);

    let (mass, position) = slab.find_max(("io", "particle_mass")).unwrap();
    assert_eq!(mass, 4.0);
    assert_close(&position, &[0.55, 0.5, 0.5]);
}

#[test]
fn test_registry_applies_center_argument() {
    let harness = TestHarness::standard();
    let registry = ContainerRegistry::new();

    let region = registry
        .create(
            "region",
            harness.dataset(),
            &json!({"left": [0.0, 0.0, 0.0], "right": [0.5, 1.0, 1.0], "center": "c"}),
        )
        .unwrap();
    assert_close(&center_of(&region), &[0.5, 0.5, 0.5]);

    assert!(matches!(
        registry.create("all", harness.dataset(), &json!({"center": "middle"})),
        Err(Error::InvalidArgument(_))
    ));
}

fn b_at_least(threshold: f64) -> impl FnOnce(&mut SelectionContainer) -> Result<Vec<bool>> {
    move |container| {
        let b = container.field("b")?;
        Ok(b.values().iter().map(|&v| v >= threshold).collect())
    }
}

#[test]
fn test_cut_region_selects_by_field_value() {
    let harness = TestHarness::standard();
    let mut container = harness.all();
    container.set_field_parameter("center", UnitArray::new(vec![1.0, 0.0, 0.0], "cm"));

    let mut cut = container.cut_region(b_at_least(5.0)).unwrap();
    assert_eq!(cut.size().unwrap(), 5);
    assert_eq!(cut.field("b").unwrap().values(), &[5.0, 6.0, 7.0, 8.0, 9.0]);
    assert_eq!(cut.field("density").unwrap().values(), &density(10)[5..]);
    assert_eq!(center_of(&cut), vec![1.0, 0.0, 0.0]);

    // particles follow the cells holding them
    assert_eq!(cut.field(("io", "particle_mass")).unwrap().values(), &PARTICLE_MASS[3..]);
}

#[test]
fn test_cut_region_stitches_ghost_zones() {
    let harness = TestHarness::line(10, 5, EngineConfig::default());
    let mut container = harness.all();

    let mut cut = container.cut_region(b_at_least(3.0)).unwrap();
    let smoothed = cut.field("smoothed").unwrap();
    assert_close(smoothed.values(), &smooth(&density(10))[3..]);
}

#[test]
fn test_cut_region_of_cut_region() {
    let harness = TestHarness::standard();
    let mut slab = harness.slab(0.2, 0.7);

    let mut upper = slab.cut_region(b_at_least(4.0)).unwrap();
    assert_eq!(upper.field("b").unwrap().values(), &[4.0, 5.0, 6.0]);

    let mut odd = upper
        .cut_region(|c| {
            let b = c.field("b")?;
            Ok(b.values().iter().map(|&v| v % 2.0 == 1.0).collect())
        })
        .unwrap();
    assert_eq!(odd.field("b").unwrap().values(), &[5.0]);
}

#[test]
fn test_ill_defined_cut() {
    let harness = TestHarness::standard();
    let mut container = harness.all();

    assert!(matches!(
        container.cut_region(|_| Ok(vec![true; 3])),
        Err(Error::IllDefinedCut { expected: 10, actual: 3 })
    ));
}

#[test]
fn test_write_out_table() {
    let harness = TestHarness::standard();
    let mut slab = harness.slab(0.2, 0.4);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slab.txt");

    slab.write_out(&path, &[FieldSpec::from("b"), FieldSpec::from("density")])
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("#\tx\ty\tz\t(gas, b)\t(gas, density)"));
    let rows: Vec<Vec<f64>> = lines
        .map(|line| line.split('\t').map(|value| value.parse().unwrap()).collect())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_close(&rows[0], &[0.25, 0.5, 0.5, 2.0, 5.0]);
    assert_close(&rows[1], &[0.35, 0.5, 0.5, 3.0, 10.0]);

    assert!(matches!(
        slab.write_out(&path, &[FieldSpec::from(("io", "particle_mass"))]),
        Err(Error::LengthMismatch { .. })
    ));
}

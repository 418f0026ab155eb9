use crate::runtime::test_scene::{ROOT, TestScene, init_logging};
use crate::{
    Animation, AnimationId, AnimationLibrary, AnimationPlayer, Attribute, EntryState, Error,
    Keyframe, ModifierKey, ObjectId, PlayerConfig, StartOptions,
};

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-5,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn ramp(library: &mut AnimationLibrary, property: &str, duration: f32, to: f32) -> AnimationId {
    library.add_animation(Animation::new(
        format!("{property}-ramp"),
        property,
        Attribute::Value,
        vec![Keyframe::linear(0.0, 0.0), Keyframe::linear(duration, to)],
    ))
}

fn constant(library: &mut AnimationLibrary, property: &str, value: f32) -> AnimationId {
    library.add_animation(Animation::new(
        format!("{property}-{value}"),
        property,
        Attribute::Value,
        vec![Keyframe::linear(0.0, value), Keyframe::linear(10.0, value)],
    ))
}

fn scene_with_box() -> (TestScene, ObjectId) {
    let mut scene = TestScene::new();
    let object = scene.add(ROOT, "box");
    scene.set(object, "opacity", 0.3);
    scene.set(object, "scale", 1.0);
    (scene, object)
}

fn opacity(object: ObjectId) -> ModifierKey {
    ModifierKey::new(object, "opacity", Attribute::Value)
}

#[test]
fn explicit_finish_restores_original_value() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let mut player = AnimationPlayer::new(library);

    let handle = player.start(fade, Some(object), &mut scene).unwrap();
    assert_approx(player.original_value(&opacity(object)).unwrap(), 0.3);

    player.update(0.5, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.5);
    assert_approx(player.current_value(&opacity(object)).unwrap(), 0.5);

    player.finish(handle, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.3);
    assert!(!player.is_live(handle));
    assert_eq!(player.modifier_count(), 0);
    assert!(player.entry_info(handle).is_none());
    assert!(matches!(
        player.finish(handle, &mut scene),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn reaching_the_end_restores_original_value() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let mut player = AnimationPlayer::new(library);

    let handle = player.start(fade, Some(object), &mut scene).unwrap();
    player.update(0.5, &mut scene).unwrap();
    player.update(0.6, &mut scene).unwrap();

    assert!(!player.is_live(handle));
    assert_eq!(player.live_entry_count(), 0);
    assert_approx(scene.get(object, "opacity"), 0.3);
}

#[test]
fn looping_entry_wraps_and_keeps_playing() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let mut player = AnimationPlayer::new(library);

    let options = StartOptions::default().looped(true);
    let handle = player
        .start_with(fade, Some(object), options, &mut scene)
        .unwrap();
    player.update(1.25, &mut scene).unwrap();
    assert!(player.is_live(handle));
    assert_approx(scene.get(object, "opacity"), 0.25);

    player.update(1.5, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.75);
}

#[test]
fn time_scale_speeds_up_playback() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let mut player = AnimationPlayer::new(library);

    let handle = player.start(fade, Some(object), &mut scene).unwrap();
    handle.set_time_scale(&mut player, 2.0);
    player.update(0.25, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.5);
    assert_approx(player.entry_info(handle).unwrap().relative_time, 0.5);
}

#[test]
fn later_full_weight_override_wins_until_it_finishes() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let low = constant(&mut library, "opacity", 5.0);
    let high = constant(&mut library, "opacity", 9.0);
    let mut player = AnimationPlayer::new(library);

    let first = player.start(low, Some(object), &mut scene).unwrap();
    let second = player.start(high, Some(object), &mut scene).unwrap();
    assert!(
        player.entry_info(second).unwrap().priority > player.entry_info(first).unwrap().priority
    );

    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 9.0);

    player.finish(second, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 5.0);
    assert_eq!(player.modifier(&opacity(object)).unwrap().claimant_count(), 1);

    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 5.0);

    player.finish(first, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.3);
}

#[test]
fn shared_record_restores_only_on_last_release() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let a = constant(&mut library, "opacity", 5.0);
    let b = constant(&mut library, "opacity", 7.0);
    let mut player = AnimationPlayer::new(library);

    let first = player.start(a, Some(object), &mut scene).unwrap();
    player.update(0.1, &mut scene).unwrap();
    let second = player.start(b, Some(object), &mut scene).unwrap();
    assert_eq!(player.modifier_count(), 1);
    assert_approx(player.original_value(&opacity(object)).unwrap(), 0.3);

    // The second entry has not composed yet, so nothing of the first one may linger.
    player.finish(first, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.3);
    assert_eq!(player.modifier_count(), 1);

    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 7.0);

    player.finish(second, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.3);
    assert_eq!(player.modifier_count(), 0);
}

#[test]
fn finishing_one_claimant_shows_the_remaining_curve_at_once() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let low = ramp(&mut library, "opacity", 1.0, 1.0);
    let high = ramp(&mut library, "opacity", 1.0, 10.0);
    let mut player = AnimationPlayer::new(library);

    let below = player.start(low, Some(object), &mut scene).unwrap();
    let above = player.start(high, Some(object), &mut scene).unwrap();
    player.update(0.5, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 5.0);

    player.finish(above, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.5);
    assert_approx(player.current_value(&opacity(object)).unwrap(), 0.5);
    assert!(player.is_live(below));

    player.update(0.25, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.75);
}

#[test]
fn partial_weight_blends_towards_later_override() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let base = constant(&mut library, "opacity", 10.0);
    let top = constant(&mut library, "opacity", 20.0);
    let mut player = AnimationPlayer::new(library);

    player.start(base, Some(object), &mut scene).unwrap();
    let handle = player.start(top, Some(object), &mut scene).unwrap();
    handle.set_weight(&mut player, 0.5);
    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 15.0);
}

#[test]
fn additive_entries_offset_the_composed_base() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let base = constant(&mut library, "scale", 10.0);
    let bump = constant(&mut library, "scale", 1.0);
    let wobble = constant(&mut library, "scale", 0.5);
    let mut player = AnimationPlayer::new(library);

    player
        .start_with(bump, Some(object), StartOptions::default().additive(), &mut scene)
        .unwrap();
    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "scale"), 2.0);

    player.start(base, Some(object), &mut scene).unwrap();
    player
        .start_with(wobble, Some(object), StartOptions::default().additive(), &mut scene)
        .unwrap();
    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "scale"), 11.5);
}

#[test]
fn composition_is_deterministic_across_players() {
    let run = || {
        let (mut scene, object) = scene_with_box();
        let mut library = AnimationLibrary::new();
        let a = ramp(&mut library, "opacity", 2.0, 1.0);
        let b = ramp(&mut library, "scale", 2.0, 3.0);
        let c = constant(&mut library, "opacity", 0.25);
        let mut player = AnimationPlayer::new(library);
        player.start(a, Some(object), &mut scene).unwrap();
        player.start(b, Some(object), &mut scene).unwrap();
        player
            .start_with(c, Some(object), StartOptions::default().additive(), &mut scene)
            .unwrap();
        for _ in 0..5 {
            player.update(0.15, &mut scene).unwrap();
        }
        scene.writes.clone()
    };
    assert_eq!(run(), run());
}

#[test]
fn clip_window_maps_player_time() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let anim = ramp(&mut library, "opacity", 4.0, 4.0);
    let clip = library.create_root_clip("window", 0.5, 3.5).unwrap();
    library.add_clip_animation(clip, anim).unwrap();
    let mut player = AnimationPlayer::new(library);

    let handle = player.start(clip, Some(object), &mut scene).unwrap();
    assert_approx(player.entry_info(handle).unwrap().duration, 3.0);

    player.update(1.0, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 1.5);
    player.update(1.0, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 2.5);
    player.update(1.5, &mut scene).unwrap();
    assert!(!player.is_live(handle));
    assert_approx(scene.get(object, "opacity"), 0.3);
}

#[test]
fn relative_clip_adds_offset_to_current_value() {
    let mut scene = TestScene::new();
    let object = scene.add(ROOT, "box");
    scene.set_attr(object, "position", Attribute::X, 10.0);
    let mut library = AnimationLibrary::new();
    let anim = library.add_animation(Animation::new(
        "slide",
        "position",
        Attribute::X,
        vec![Keyframe::linear(0.0, 0.0), Keyframe::linear(4.0, 4.0)],
    ));
    let clip = library.create_root_clip("slide", 1.0, 3.0).unwrap();
    library.add_clip_animation(clip, anim).unwrap();
    library.set_clip_relative(clip, true).unwrap();
    let mut player = AnimationPlayer::new(library);

    player.start(clip, Some(object), &mut scene).unwrap();
    let position = ModifierKey::new(object, "position", Attribute::X);
    assert!(player.modifier(&position).unwrap().is_relative);
    player.update(1.0, &mut scene).unwrap();
    assert_approx(scene.get_attr(object, "position", Attribute::X), 11.0);
}

#[test]
fn child_clip_animations_resolve_through_clip_paths() {
    let mut scene = TestScene::new();
    let panel = scene.add(ROOT, "panel");
    let icon = scene.add(panel, "icon");
    scene.set(panel, "opacity", 0.0);
    scene.set(icon, "scale", 1.0);

    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let grow = ramp(&mut library, "scale", 1.0, 2.0);
    let root = library.create_root_clip("show", 0.0, 1.0).unwrap();
    let child = library.create_child_clip("icon");
    library.add_clip_animation(root, fade).unwrap();
    library.add_clip_animation(child, grow).unwrap();
    library.add_animation_clip(root, child).unwrap();
    library
        .set_clip_target_path(child, Some("icon".to_string()))
        .unwrap();
    let mut player = AnimationPlayer::new(library);

    let handle = player.start(root, Some(panel), &mut scene).unwrap();
    assert_eq!(player.entry_info(handle).unwrap().targets.len(), 2);
    player.update(0.5, &mut scene).unwrap();
    assert_approx(scene.get(panel, "opacity"), 0.5);
    assert_approx(scene.get(icon, "scale"), 1.0);
}

#[test]
fn start_rejects_unknown_items_and_child_clips() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let child = library.create_child_clip("child");
    library.remove_animation(fade);
    let mut player = AnimationPlayer::new(library);

    assert!(matches!(
        player.start(fade, Some(object), &mut scene),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        player.start(child, Some(object), &mut scene),
        Err(Error::IncompatibleItem { .. })
    ));
    assert_eq!(player.live_entry_count(), 0);
}

#[test]
fn unresolvable_target_fails_start_and_releases_claims() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let lost = library.add_animation(
        Animation::new(
            "lost",
            "opacity",
            Attribute::Value,
            vec![Keyframe::linear(0.0, 1.0)],
        )
        .with_target_path("missing"),
    );
    let clip = library.create_root_clip("clip", 0.0, 1.0).unwrap();
    library.add_clip_animation(clip, fade).unwrap();
    library.add_clip_animation(clip, lost).unwrap();
    let mut player = AnimationPlayer::new(library);

    let err = player.start(clip, Some(object), &mut scene).unwrap_err();
    assert!(matches!(err, Error::InvalidTarget { ref path } if path == "missing"));
    assert_eq!(player.live_entry_count(), 0);
    assert_eq!(player.modifier_count(), 0);
    assert!(player.top_level_entries().is_empty());
}

#[test]
fn failed_write_skips_only_that_group() {
    init_logging();
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let grow = ramp(&mut library, "scale", 1.0, 2.0);
    let mut player = AnimationPlayer::new(library);

    player.start(fade, Some(object), &mut scene).unwrap();
    player.start(grow, Some(object), &mut scene).unwrap();
    scene.fail_writes(object, "opacity");

    player.update(0.5, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.3);
    assert_approx(scene.get(object, "scale"), 1.0);
    assert_eq!(scene.write_count(object, "scale"), 1);
    assert_eq!(scene.write_count(object, "opacity"), 0);
}

#[test]
fn wrong_data_type_is_dropped_per_sample() {
    init_logging();
    let (mut scene, object) = scene_with_box();
    scene.set_wrong_type(object, "opacity");
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let grow = ramp(&mut library, "scale", 1.0, 2.0);
    let mut player = AnimationPlayer::new(library);

    let handle = player.start(fade, Some(object), &mut scene).unwrap();
    player.start(grow, Some(object), &mut scene).unwrap();
    assert!(player.entry_info(handle).unwrap().targets.is_empty());

    player.update(0.5, &mut scene).unwrap();
    assert_approx(scene.get(object, "scale"), 1.0);
    assert_eq!(player.modifier_count(), 1);
}

#[test]
fn modifier_capacity_limit_fails_the_update() {
    init_logging();
    let mut scene = TestScene::new();
    let panel = scene.add(ROOT, "panel");
    let a = scene.add(panel, "a");
    let b = scene.add(panel, "b");
    scene.set(a, "opacity", 0.3);
    scene.set(b, "opacity", 0.6);
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let clip = library.create_root_clip("clip", 0.0, 1.0).unwrap();
    library.add_clip_animation(clip, fade).unwrap();
    library
        .set_clip_target_path(clip, Some("a".to_string()))
        .unwrap();
    let config = PlayerConfig {
        max_modifier_records: Some(1),
        ..PlayerConfig::default()
    };
    let mut player = AnimationPlayer::with_config(library, config);

    player.start(clip, Some(panel), &mut scene).unwrap();
    player.update(0.25, &mut scene).unwrap();

    // The new target is claimed before the old one is released.
    player
        .library_mut()
        .set_clip_target_path(clip, Some("b".to_string()))
        .unwrap();
    let err = player.update(0.25, &mut scene).unwrap_err();
    assert!(matches!(err, Error::ModifierStackExhausted { capacity: 1 }));
}

#[test]
fn capacity_exhausted_while_composing_leaves_the_scene_untouched() {
    let mut scene = TestScene::new();
    let a = scene.add(ROOT, "a");
    let b = scene.add(ROOT, "b");
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let config = PlayerConfig {
        max_modifier_records: Some(1),
        ..PlayerConfig::default()
    };
    let mut player = AnimationPlayer::with_config(library, config);

    // Neither property exists yet, so both claims wait for the first update.
    player.start(fade, Some(a), &mut scene).unwrap();
    player.start(fade, Some(b), &mut scene).unwrap();
    assert_eq!(player.modifier_count(), 0);

    scene.set(a, "opacity", 0.3);
    scene.set(b, "opacity", 0.6);
    let err = player.update(0.5, &mut scene).unwrap_err();
    assert!(matches!(err, Error::ModifierStackExhausted { capacity: 1 }));
    assert!(scene.writes.is_empty());
    assert_approx(scene.get(a, "opacity"), 0.3);
    assert_approx(scene.get(b, "opacity"), 0.6);
}

#[test]
fn capacity_limit_also_rejects_start() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let grow = ramp(&mut library, "scale", 1.0, 2.0);
    let config = PlayerConfig {
        max_modifier_records: Some(1),
        ..PlayerConfig::default()
    };
    let mut player = AnimationPlayer::with_config(library, config);

    player.start(fade, Some(object), &mut scene).unwrap();
    assert!(matches!(
        player.start(grow, Some(object), &mut scene),
        Err(Error::ModifierStackExhausted { .. })
    ));
    assert_eq!(player.live_entry_count(), 1);
}

#[test]
fn invalid_delta_is_ignored() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let mut player = AnimationPlayer::new(library);
    let handle = player.start(fade, Some(object), &mut scene).unwrap();

    player.update(f32::NAN, &mut scene).unwrap();
    player.update(-1.0, &mut scene).unwrap();
    player.update(f32::INFINITY, &mut scene).unwrap();
    assert_eq!(player.time(), 0.0);
    assert_eq!(player.entry_info(handle).unwrap().relative_time, 0.0);
    assert!(scene.writes.is_empty());
}

#[test]
fn driven_entry_recomputes_only_after_notification() {
    let (mut scene, object) = scene_with_box();
    scene.set(object, "progress", 2.0);
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 10.0, 10.0);
    let mut player = AnimationPlayer::new(library);

    let driver = ModifierKey::new(object, "progress", Attribute::Value);
    let handle = player
        .start_driven(fade, Some(object), driver, &mut scene)
        .unwrap();
    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 2.0);

    scene.set(object, "progress", 5.0);
    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 2.0);

    assert_eq!(
        player.notify_property_changed(object, "progress", Attribute::Value),
        1
    );
    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 5.0);

    scene.set(object, "progress", 20.0);
    player.notify_property_changed(object, "progress", Attribute::Value);
    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 10.0);
    assert_eq!(player.entry_info(handle).unwrap().state, EntryState::Playing);
}

#[test]
fn unchanged_driver_writes_do_not_recompute_driven_entries() {
    let (mut scene, object) = scene_with_box();
    scene.set(object, "progress", 0.0);
    let mut library = AnimationLibrary::new();
    let hold = constant(&mut library, "progress", 0.5);
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let mut player = AnimationPlayer::new(library);

    let driver = ModifierKey::new(object, "progress", Attribute::Value);
    player.start(hold, Some(object), &mut scene).unwrap();
    player
        .start_driven(fade, Some(object), driver, &mut scene)
        .unwrap();
    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.0);

    // The driver moved from 0 to 0.5 during the last update.
    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.5);

    // Rewriting the same 0.5 must not trigger another read of the driver.
    scene.set(object, "progress", 0.9);
    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.5);
    assert_approx(scene.get(object, "progress"), 0.5);
}

#[test]
fn update_within_only_writes_inside_root() {
    let mut scene = TestScene::new();
    let panel = scene.add(ROOT, "panel");
    let inside = scene.add(panel, "inside");
    let outside = scene.add(ROOT, "outside");
    scene.set(inside, "opacity", 0.0);
    scene.set(outside, "opacity", 0.0);
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let mut player = AnimationPlayer::new(library);

    player.start(fade, Some(inside), &mut scene).unwrap();
    player.start(fade, Some(outside), &mut scene).unwrap();
    player.update_within(0.5, Some(panel), &mut scene).unwrap();

    assert_approx(scene.get(inside, "opacity"), 0.5);
    assert_approx(scene.get(outside, "opacity"), 0.0);
}

#[test]
fn finish_object_cancels_entries_on_that_object() {
    let mut scene = TestScene::new();
    let a = scene.add(ROOT, "a");
    let b = scene.add(ROOT, "b");
    scene.set(a, "opacity", 0.3);
    scene.set(a, "scale", 3.0);
    scene.set(b, "opacity", 0.3);
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let grow = ramp(&mut library, "scale", 1.0, 2.0);
    let mut player = AnimationPlayer::new(library);

    player.start(fade, Some(a), &mut scene).unwrap();
    player.start(grow, Some(a), &mut scene).unwrap();
    let other = player.start(fade, Some(b), &mut scene).unwrap();
    player.update(0.5, &mut scene).unwrap();

    assert_eq!(player.finish_object(a, &mut scene), 2);
    assert_approx(scene.get(a, "opacity"), 0.3);
    assert_approx(scene.get(a, "scale"), 3.0);
    assert!(player.is_live(other));
    assert_approx(scene.get(b, "opacity"), 0.5);

    player.finish_all(&mut scene);
    assert_eq!(player.live_entry_count(), 0);
    assert_approx(scene.get(b, "opacity"), 0.3);
}

#[test]
fn library_edits_retarget_live_entries() {
    init_logging();
    let mut scene = TestScene::new();
    let panel = scene.add(ROOT, "panel");
    let a = scene.add(panel, "a");
    let b = scene.add(panel, "b");
    scene.set(a, "opacity", 0.3);
    scene.set(b, "opacity", 0.6);
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let clip = library.create_root_clip("clip", 0.0, 1.0).unwrap();
    library.add_clip_animation(clip, fade).unwrap();
    library
        .set_clip_target_path(clip, Some("a".to_string()))
        .unwrap();
    let mut player = AnimationPlayer::new(library);

    player.start(clip, Some(panel), &mut scene).unwrap();
    player.update(0.25, &mut scene).unwrap();
    assert_approx(scene.get(a, "opacity"), 0.25);

    player
        .library_mut()
        .set_clip_target_path(clip, Some("b".to_string()))
        .unwrap();
    player.update(0.25, &mut scene).unwrap();
    assert_approx(scene.get(a, "opacity"), 0.3);
    assert_approx(scene.get(b, "opacity"), 0.5);
    assert_approx(
        player
            .original_value(&ModifierKey::new(b, "opacity", Attribute::Value))
            .unwrap(),
        0.6,
    );
}

#[test]
fn removing_the_item_finishes_its_entry() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let fade = ramp(&mut library, "opacity", 1.0, 1.0);
    let mut player = AnimationPlayer::new(library);

    let handle = player.start(fade, Some(object), &mut scene).unwrap();
    player.update(0.5, &mut scene).unwrap();
    player.library_mut().remove_animation(fade);
    player.update(0.1, &mut scene).unwrap();

    assert!(!player.is_live(handle));
    assert_approx(scene.get(object, "opacity"), 0.3);
}

#[test]
fn removed_target_object_stops_receiving_writes() {
    init_logging();
    let mut scene = TestScene::new();
    let panel = scene.add(ROOT, "panel");
    let icon = scene.add(panel, "icon");
    scene.set(icon, "opacity", 0.0);
    let mut library = AnimationLibrary::new();
    let fade = library.add_animation(
        Animation::new(
            "fade",
            "opacity",
            Attribute::Value,
            vec![Keyframe::linear(0.0, 0.0), Keyframe::linear(2.0, 1.0)],
        )
        .with_target_path("icon"),
    );
    let mut player = AnimationPlayer::new(library);

    let handle = player.start(fade, Some(panel), &mut scene).unwrap();
    player.update(0.5, &mut scene).unwrap();
    assert_eq!(scene.write_count(icon, "opacity"), 1);

    scene.remove(icon);
    player.update(0.5, &mut scene).unwrap();
    player.update(0.5, &mut scene).unwrap();
    assert_eq!(scene.write_count(icon, "opacity"), 1);
    assert!(player.is_live(handle));
}

#[test]
fn clearing_entry_caches_re_resolves_targets() {
    let mut scene = TestScene::new();
    let panel = scene.add(ROOT, "panel");
    let first = scene.add(panel, "icon");
    scene.set(first, "opacity", 0.0);
    let mut library = AnimationLibrary::new();
    let fade = library.add_animation(
        Animation::new(
            "fade",
            "opacity",
            Attribute::Value,
            vec![Keyframe::linear(0.0, 0.0), Keyframe::linear(2.0, 1.0)],
        )
        .with_target_path("icon"),
    );
    let mut player = AnimationPlayer::new(library);
    let handle = player.start(fade, Some(panel), &mut scene).unwrap();
    player.update(0.5, &mut scene).unwrap();

    scene.remove(first);
    let second = scene.add(panel, "icon");
    scene.set(second, "opacity", 0.1);
    player.clear_entry_caches(handle);
    player.update(0.5, &mut scene).unwrap();

    assert_approx(scene.get(second, "opacity"), 0.5);
    assert_eq!(
        player.entry_info(handle).unwrap().targets,
        vec![ModifierKey::new(second, "opacity", Attribute::Value)]
    );
}

#[test]
fn default_weight_comes_from_config() {
    let (mut scene, object) = scene_with_box();
    let mut library = AnimationLibrary::new();
    let full = constant(&mut library, "opacity", 1.0);
    let config = PlayerConfig {
        default_weight: 0.5,
        ..PlayerConfig::default()
    };
    let mut player = AnimationPlayer::with_config(library, config);

    let handle = player.start(full, Some(object), &mut scene).unwrap();
    assert_approx(player.entry_info(handle).unwrap().weight, 0.5);
    player.update(0.1, &mut scene).unwrap();
    assert_approx(scene.get(object, "opacity"), 0.65);
}

use crate::{AnimationClip, AnimationId, AnimationLibrary, ClipId, ClipKind, Error};

/// One animation's value produced while animating a clip.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipSample {
    pub clip: ClipId,
    pub animation: AnimationId,
    pub value: f32,
    /// Time on the animation's own curve after windowing.
    pub time: f32,
    pub is_relative: bool,
}

impl AnimationLibrary {
    pub fn create_root_clip(
        &mut self,
        name: impl Into<String>,
        start_time: f32,
        end_time: f32,
    ) -> Result<ClipId, Error> {
        if !start_time.is_finite() || !end_time.is_finite() {
            return Err(Error::invalid_value("clip window must be finite"));
        }
        if end_time < start_time {
            return Err(Error::invalid_value(format!(
                "clip end {end_time} is before start {start_time}"
            )));
        }
        Ok(self.clips.insert(AnimationClip {
            name: name.into(),
            target_path: None,
            kind: ClipKind::Root {
                start_time,
                end_time,
            },
            is_relative: false,
            parent: None,
            children: Vec::new(),
            animations: Vec::new(),
        }))
    }

    /// Child clips have no window; they must be attached with [`Self::add_animation_clip`].
    pub fn create_child_clip(&mut self, name: impl Into<String>) -> ClipId {
        self.clips.insert(AnimationClip {
            name: name.into(),
            target_path: None,
            kind: ClipKind::Child,
            is_relative: false,
            parent: None,
            children: Vec::new(),
            animations: Vec::new(),
        })
    }

    pub fn set_clip_relative(&mut self, id: ClipId, relative: bool) -> Result<(), Error> {
        let clip = self.clip_mut(id)?;
        if !clip.is_root() {
            return Err(Error::invalid_value(format!(
                "clip '{}' is a child clip; relative playback is set on its root",
                clip.name
            )));
        }
        clip.is_relative = relative;
        Ok(())
    }

    pub fn set_clip_target_path(&mut self, id: ClipId, path: Option<String>) -> Result<(), Error> {
        self.clip_mut(id)?.target_path = path;
        Ok(())
    }

    pub fn add_clip_animation(&mut self, clip: ClipId, animation: AnimationId) -> Result<(), Error> {
        if !self.animations.contains_key(animation) {
            return Err(Error::not_found("animation"));
        }
        let clip = self.clip_mut(clip)?;
        if !clip.animations.contains(&animation) {
            clip.animations.push(animation);
        }
        Ok(())
    }

    pub fn remove_clip_animation(
        &mut self,
        clip: ClipId,
        animation: AnimationId,
    ) -> Result<(), Error> {
        let clip = self.clip_mut(clip)?;
        let Some(index) = clip.animations.iter().position(|a| *a == animation) else {
            return Err(Error::not_found(format!(
                "animation is not part of clip '{}'",
                clip.name
            )));
        };
        clip.animations.remove(index);
        Ok(())
    }

    pub fn add_animation_clip(&mut self, parent: ClipId, child: ClipId) -> Result<(), Error> {
        if !self.clips.contains_key(parent) {
            return Err(Error::not_found("parent clip"));
        }
        let child_clip = self.clip(child).ok_or_else(|| Error::not_found("child clip"))?;
        if child_clip.is_root() {
            return Err(Error::IncompatibleItem {
                message: format!("root clip '{}' cannot be nested", child_clip.name),
            });
        }
        if child_clip.parent.is_some() {
            return Err(Error::invalid_value(format!(
                "clip '{}' already has a parent",
                child_clip.name
            )));
        }
        if self.clip_ancestors(parent).any(|a| a == child) {
            return Err(Error::invalid_value(format!(
                "attaching clip '{}' would create a cycle",
                child_clip.name
            )));
        }

        self.clip_mut(parent)?.children.push(child);
        self.clip_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn remove_from_parent(&mut self, parent: ClipId, child: ClipId) -> Result<(), Error> {
        let parent_clip = self.clip_mut(parent)?;
        let Some(index) = parent_clip.children.iter().position(|c| *c == child) else {
            return Err(Error::not_found(format!(
                "clip is not a child of '{}'",
                parent_clip.name
            )));
        };
        parent_clip.children.remove(index);
        if let Some(child_clip) = self.clips.get_mut(child) {
            child_clip.parent = None;
        }
        Ok(())
    }

    /// Window length of the clip's root; 0 for orphaned child clips.
    pub fn clip_duration(&self, id: ClipId) -> f32 {
        self.clip_root(id)
            .and_then(|root| self.clip(root))
            .and_then(AnimationClip::window)
            .map(|(start, end)| end - start)
            .unwrap_or(0.0)
    }

    /// The clip itself followed by its ancestors, nearest first.
    pub fn clip_ancestors(&self, id: ClipId) -> impl Iterator<Item = ClipId> + '_ {
        let mut next = self.clips.contains_key(id).then_some(id);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.clips.get(current).and_then(|c| c.parent);
            Some(current)
        })
    }

    pub fn clip_root(&self, id: ClipId) -> Option<ClipId> {
        self.clip_ancestors(id)
            .last()
            .filter(|root| self.clip(*root).is_some_and(AnimationClip::is_root))
    }

    /// Maps a clip-local playback time onto the animation curves. Root clips clamp into
    /// `[start, end]`; child clips always defer to their root so they never see the raw clock.
    pub fn clip_time(&self, id: ClipId, time: f32) -> Option<f32> {
        let clip = self.clip(id)?;
        match clip.kind {
            ClipKind::Root {
                start_time,
                end_time,
            } => Some((start_time + time).clamp(start_time, end_time)),
            ClipKind::Child => self.child_time(clip.parent?, time),
        }
    }

    fn child_time(&self, parent: ClipId, time: f32) -> Option<f32> {
        self.clip_time(parent, time)
    }

    /// Samples every animation of `id` and its descendants at clip-local `time`.
    pub fn animate_clip(&self, id: ClipId, time: f32, out: &mut Vec<ClipSample>) {
        let Some(root) = self.clip_root(id).and_then(|r| self.clip(r)) else {
            return;
        };
        let Some((window_start, _)) = root.window() else {
            return;
        };
        let Some(effective) = self.clip_time(id, time) else {
            return;
        };
        self.animate_clip_at(id, effective, window_start, root.is_relative, out);
    }

    fn animate_clip_at(
        &self,
        id: ClipId,
        effective: f32,
        window_start: f32,
        is_relative: bool,
        out: &mut Vec<ClipSample>,
    ) {
        let Some(clip) = self.clip(id) else {
            return;
        };
        for &animation_id in &clip.animations {
            let Some(animation) = self.animation(animation_id) else {
                continue;
            };
            let Some(mut value) = animation.sample(effective) else {
                continue;
            };
            if is_relative {
                value -= animation.sample(window_start).unwrap_or(0.0);
            }
            out.push(ClipSample {
                clip: id,
                animation: animation_id,
                value,
                time: effective,
                is_relative,
            });
        }
        for &child in &clip.children {
            self.animate_clip_at(child, effective, window_start, is_relative, out);
        }
    }

    /// Every `(clip, animation)` pair the clip can produce samples for, in sampling order.
    pub fn clip_targets(&self, id: ClipId) -> Vec<(ClipId, AnimationId)> {
        let mut out = Vec::new();
        self.collect_clip_targets(id, &mut out);
        out
    }

    fn collect_clip_targets(&self, id: ClipId, out: &mut Vec<(ClipId, AnimationId)>) {
        let Some(clip) = self.clip(id) else {
            return;
        };
        out.extend(clip.animations.iter().map(|a| (id, *a)));
        for &child in &clip.children {
            self.collect_clip_targets(child, out);
        }
    }

    /// Joins the clip chain's target paths (root first) with the animation's own path.
    pub fn clip_target_path(&self, clip: ClipId, animation: AnimationId) -> Option<String> {
        let mut segments = self
            .clip_ancestors(clip)
            .filter_map(|c| self.clip(c).and_then(|c| c.target_path.clone()))
            .collect::<Vec<_>>();
        segments.reverse();
        if let Some(path) = self.animation(animation).and_then(|a| a.target_path.clone()) {
            segments.push(path);
        }
        join_paths(segments)
    }

    fn clip_mut(&mut self, id: ClipId) -> Result<&mut AnimationClip, Error> {
        self.clips.get_mut(id).ok_or_else(|| Error::not_found("clip"))
    }
}

pub(crate) fn join_paths(segments: impl IntoIterator<Item = String>) -> Option<String> {
    let joined = segments
        .into_iter()
        .map(|s| s.trim_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    (!joined.is_empty()).then_some(joined)
}

use std::collections::BTreeSet;

use chunks::{ComposedProgram, ShaderComposer, UniformTable};
use scheduler::{FrameScheduler, FrameTime};

use crate::error::{DrawError, RenderError};
use crate::host::RenderHost;
use crate::plugins::PluginSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    Running,
}

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub recomposed: bool,
    pub compile_failed: bool,
    pub hooks_run: usize,
    pub drew: bool,
    pub draw_error: Option<DrawError>,
}

/// Cumulative counters since [`RenderLoop::start`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub recompositions: u64,
    pub compile_failures: u64,
    pub draws: u64,
    pub skipped_draws: u64,
}

struct BoundProgram<P> {
    program: P,
    composed: ComposedProgram,
    composition: u64,
    reported_mismatches: BTreeSet<String>,
}

/// Per-refresh driver: recompose on dirty, run hooks, upload, draw.
///
/// Owns the plugin set (and with it the dirty flag), the composer with its
/// function set and uniform table, and the last successfully compiled program.
pub struct RenderLoop<H: RenderHost> {
    host: H,
    plugins: PluginSet,
    composer: ShaderComposer,
    state: LoopState,
    bound: Option<BoundProgram<H::Program>>,
    stats: LoopStats,
}

impl<H: RenderHost> RenderLoop<H> {
    pub fn new(host: H, plugins: PluginSet) -> Self {
        Self::with_composer(host, plugins, ShaderComposer::new())
    }

    pub fn with_composer(host: H, plugins: PluginSet, composer: ShaderComposer) -> Self {
        Self {
            host,
            plugins,
            composer,
            state: LoopState::Uninitialized,
            bound: None,
            stats: LoopStats::default(),
        }
    }

    /// Enters `Running` and schedules the first composition.
    pub fn start(&mut self) {
        if self.state == LoopState::Running {
            return;
        }
        self.state = LoopState::Running;
        self.plugins.mark_changed();
        tracing::debug!(plugins = self.plugins.len(), "render loop started");
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginSet {
        &mut self.plugins
    }

    pub fn uniforms(&self) -> &UniformTable {
        self.composer.uniforms()
    }

    pub fn uniforms_mut(&mut self) -> &mut UniformTable {
        self.composer.uniforms_mut()
    }

    /// Composed source of the program currently drawn, if any.
    pub fn bound_program(&self) -> Option<&ComposedProgram> {
        self.bound.as_ref().map(|bound| &bound.composed)
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Runs one tick and asks `scheduler` for the next one.
    pub fn run_frame<S: FrameScheduler + ?Sized>(&mut self, scheduler: &mut S, frame: &FrameTime) -> TickReport {
        let report = self.tick(frame);
        scheduler.request_frame();
        report
    }

    /// One display refresh. A no-op before [`RenderLoop::start`].
    pub fn tick(&mut self, frame: &FrameTime) -> TickReport {
        let mut report = TickReport::default();
        if self.state != LoopState::Running {
            tracing::trace!("tick before start; ignoring");
            return report;
        }
        self.stats.ticks += 1;

        if self.plugins.is_dirty() {
            report.recomposed = true;
            report.compile_failed = !self.recompose();
        }

        for plugin in self.plugins.active_mut() {
            if let Some(hook) = plugin.frame_hook() {
                hook.on_frame(frame, self.composer.uniforms_mut());
                report.hooks_run += 1;
            }
        }

        let Some(bound) = self.bound.as_mut() else {
            self.stats.skipped_draws += 1;
            return report;
        };

        let undeclared: Vec<String> = self
            .composer
            .uniforms()
            .names()
            .filter(|name| !bound.composed.declares(name))
            .filter(|name| !bound.reported_mismatches.contains(*name))
            .map(str::to_string)
            .collect();
        if !undeclared.is_empty() {
            bound.reported_mismatches.extend(undeclared.iter().cloned());
            self.host
                .report(&RenderError::UniformMismatch { names: undeclared });
        }

        self.host
            .upload_uniforms(&mut bound.program, self.composer.uniforms());
        match self.host.draw(&bound.program) {
            Ok(()) => {
                report.drew = true;
                self.stats.draws += 1;
            }
            Err(err) => {
                self.host.report(&RenderError::Draw(err.clone()));
                report.draw_error = Some(err);
            }
        }
        report
    }

    /// Composes the active plugins and binds the result. Clears the dirty
    /// flag whatever the outcome; returns whether the new program is bound.
    fn recompose(&mut self) -> bool {
        let composed = self.composer.compose_plugins(self.plugins.active());
        self.plugins.clear_dirty();
        self.stats.recompositions += 1;
        let composition = self.composer.compositions();

        match self.host.compile(&composed) {
            Ok(program) => {
                tracing::debug!(
                    composition,
                    uniforms = composed.uniforms.len(),
                    "bound recomposed program"
                );
                self.bound = Some(BoundProgram {
                    program,
                    composed,
                    composition,
                    reported_mismatches: BTreeSet::new(),
                });
                true
            }
            Err(source) => {
                self.stats.compile_failures += 1;
                if let Some(bound) = &self.bound {
                    tracing::debug!(
                        kept = bound.composition,
                        "keeping last good program after failed composition"
                    );
                }
                self.host
                    .report(&RenderError::Compile { composition, source });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileLinkError;
    use chunks::{ChunkPlugin, FrameHook, ShaderChunks};
    use scheduler::ManualScheduler;
    use std::borrow::Cow;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Compile(u32),
        Upload(u32),
        Draw(u32),
        Report(String),
    }

    #[derive(Default)]
    struct RecordingHost {
        calls: Rc<RefCell<Vec<Call>>>,
        next_id: u32,
        fail_when: Option<&'static str>,
    }

    impl RenderHost for RecordingHost {
        type Program = u32;

        fn compile(&mut self, program: &ComposedProgram) -> Result<u32, CompileLinkError> {
            if let Some(marker) = self.fail_when {
                if program.source.contains(marker) {
                    return Err(CompileLinkError::parse(format!("injected failure on {marker}")));
                }
            }
            self.next_id += 1;
            self.calls.borrow_mut().push(Call::Compile(self.next_id));
            Ok(self.next_id)
        }

        fn upload_uniforms(&mut self, program: &mut u32, _uniforms: &UniformTable) {
            self.calls.borrow_mut().push(Call::Upload(*program));
        }

        fn draw(&mut self, program: &u32) -> Result<(), DrawError> {
            self.calls.borrow_mut().push(Call::Draw(*program));
            Ok(())
        }

        fn report(&mut self, error: &RenderError) {
            let label = match error {
                RenderError::Compile { .. } => "compile".to_string(),
                RenderError::UniformMismatch { names } => format!("mismatch:{}", names.join(",")),
                RenderError::Draw(_) => "draw".to_string(),
            };
            self.calls.borrow_mut().push(Call::Report(label));
        }
    }

    struct Layer {
        source: &'static str,
        uniform: Option<&'static str>,
        calls: Rc<RefCell<Vec<Call>>>,
    }

    impl ChunkPlugin for Layer {
        fn kind(&self) -> &str {
            "layer"
        }

        fn shader_chunks(&self) -> Option<ShaderChunks> {
            let chunks = ShaderChunks::new().with_source(self.source);
            Some(match self.uniform {
                Some(name) => chunks.with_uniforms(format!("uniform float {name};")),
                None => chunks,
            })
        }

        fn frame_hook(&mut self) -> Option<&mut dyn FrameHook> {
            Some(self)
        }
    }

    impl FrameHook for Layer {
        fn on_frame(&mut self, frame: &FrameTime, uniforms: &mut UniformTable) {
            self.calls.borrow_mut().push(Call::Report("hook".into()));
            if let Some(name) = self.uniform {
                uniforms.set(name, frame.seconds());
            }
        }
    }

    struct Tint;

    impl ChunkPlugin for Tint {
        fn kind(&self) -> &str {
            "tint"
        }

        fn glsl_function(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("vec3 tint(vec3 c) { return c * 0.5; }"))
        }

        fn shader_chunks(&self) -> Option<ShaderChunks> {
            Some(ShaderChunks::new().with_main("gl_FragColor.rgb = tint(gl_FragColor.rgb);"))
        }
    }

    fn fixture(fail_when: Option<&'static str>) -> (RenderLoop<RecordingHost>, Rc<RefCell<Vec<Call>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let host = RecordingHost {
            calls: calls.clone(),
            next_id: 0,
            fail_when,
        };
        let mut plugins = PluginSet::new();
        plugins.push(Box::new(Layer {
            source: "return vec4(1.0,0.0,0.0,1.0);",
            uniform: Some("u_time"),
            calls: calls.clone(),
        }));
        (RenderLoop::new(host, plugins), calls)
    }

    fn layer(source: &'static str, calls: &Rc<RefCell<Vec<Call>>>) -> Box<dyn ChunkPlugin> {
        Box::new(Layer {
            source,
            uniform: None,
            calls: calls.clone(),
        })
    }

    #[test]
    fn tick_before_start_does_nothing() {
        let (mut render_loop, calls) = fixture(None);
        let report = render_loop.tick(&FrameTime::ZERO);
        assert_eq!(report, TickReport::default());
        assert!(calls.borrow().is_empty());
        assert_eq!(render_loop.state(), LoopState::Uninitialized);
    }

    #[test]
    fn recomposes_once_per_dirty_transition() {
        let (mut render_loop, _calls) = fixture(None);
        render_loop.start();
        let mut scheduler = ManualScheduler::sixty_hz();
        let mut reports = Vec::new();
        scheduler.pump_frames(4, |scheduler, time| {
            reports.push(render_loop.run_frame(scheduler, &time));
        });
        assert_eq!(reports.len(), 4);
        assert!(reports[0].recomposed);
        assert!(reports[1..].iter().all(|report| !report.recomposed));
        assert!(reports.iter().all(|report| report.drew));
        assert_eq!(render_loop.stats().recompositions, 1);
    }

    #[test]
    fn recomposition_precedes_hooks_and_upload() {
        let (mut render_loop, calls) = fixture(None);
        render_loop.start();
        render_loop.tick(&FrameTime::ZERO);
        assert_eq!(
            *calls.borrow(),
            vec![
                Call::Compile(1),
                Call::Report("hook".into()),
                Call::Upload(1),
                Call::Draw(1),
            ]
        );
    }

    #[test]
    fn plugin_added_mid_run_is_picked_up_next_tick() {
        let (mut render_loop, calls) = fixture(None);
        render_loop.start();
        render_loop.tick(&FrameTime::ZERO);
        render_loop
            .plugins_mut()
            .push(layer("// second layer", &calls));
        let report = render_loop.tick(&FrameTime::ZERO);
        assert!(report.recomposed);
        let bound = render_loop.bound_program().unwrap();
        assert!(bound.source.contains("// second layer"));
        assert_eq!(report.hooks_run, 2);
    }

    #[test]
    fn loops_keep_their_own_functions_and_dirty_flags() {
        let (mut first, _) = fixture(None);
        let (mut second, _) = fixture(None);
        first.start();
        second.start();
        first.plugins_mut().push(Box::new(Tint));
        first.tick(&FrameTime::ZERO);
        second.tick(&FrameTime::ZERO);

        let helper = "vec3 tint(vec3 c)";
        assert!(first.bound_program().unwrap().source.contains(helper));
        assert!(!second.bound_program().unwrap().source.contains(helper));

        first.plugins_mut().mark_changed();
        assert!(first.plugins().is_dirty());
        assert!(!second.plugins().is_dirty());
        assert!(!second.tick(&FrameTime::ZERO).recomposed);
        assert!(first.tick(&FrameTime::ZERO).recomposed);
    }

    #[test]
    fn uniform_writes_do_not_recompose() {
        let (mut render_loop, _calls) = fixture(None);
        render_loop.start();
        render_loop.tick(&FrameTime::ZERO);
        render_loop.uniforms_mut().set("u_time", 5.0f32);
        let report = render_loop.tick(&FrameTime::ZERO);
        assert!(!report.recomposed);
        assert!(!render_loop.plugins().is_dirty());
    }

    #[test]
    fn failed_compile_keeps_last_good_program_drawing() {
        let (mut render_loop, calls) = fixture(Some("BROKEN"));
        render_loop.start();
        render_loop.tick(&FrameTime::ZERO);

        render_loop
            .plugins_mut()
            .push(layer("BROKEN syntax here", &calls));
        calls.borrow_mut().clear();

        let mut scheduler = ManualScheduler::sixty_hz();
        let mut reports = Vec::new();
        scheduler.pump_frames(4, |scheduler, time| {
            reports.push(render_loop.run_frame(scheduler, &time));
        });

        assert!(reports[0].recomposed);
        assert!(reports[0].compile_failed);
        for report in &reports[1..] {
            assert!(!report.recomposed, "failed composition must not be retried");
            assert!(report.drew);
        }
        let draws: Vec<Call> = calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Draw(_)))
            .cloned()
            .collect();
        assert_eq!(draws, vec![Call::Draw(1); 4]);
        assert_eq!(
            calls
                .borrow()
                .iter()
                .filter(|call| **call == Call::Report("compile".into()))
                .count(),
            1
        );
        assert_eq!(render_loop.stats().compile_failures, 1);
    }

    #[test]
    fn no_program_means_hooks_without_draws() {
        let (mut render_loop, _calls) = fixture(Some("vec4(1.0,0.0,0.0,1.0)"));
        render_loop.start();
        for _ in 0..3 {
            let report = render_loop.tick(&FrameTime::ZERO);
            assert_eq!(report.hooks_run, 1);
            assert!(!report.drew);
        }
        assert_eq!(render_loop.stats().skipped_draws, 3);
        assert!(render_loop.bound_program().is_none());
    }

    #[test]
    fn undeclared_uniforms_are_reported_once_per_program() {
        let (mut render_loop, calls) = fixture(None);
        render_loop.start();
        render_loop.uniforms_mut().set("u_orphan", 1.0f32);
        for _ in 0..3 {
            render_loop.tick(&FrameTime::ZERO);
        }
        let mismatches = calls
            .borrow()
            .iter()
            .filter(|call| **call == Call::Report("mismatch:u_orphan".into()))
            .count();
        assert_eq!(mismatches, 1);

        render_loop.plugins_mut().mark_changed();
        render_loop.tick(&FrameTime::ZERO);
        let mismatches = calls
            .borrow()
            .iter()
            .filter(|call| **call == Call::Report("mismatch:u_orphan".into()))
            .count();
        assert_eq!(mismatches, 2);
    }

    #[test]
    fn cancelled_scheduler_stops_the_loop() {
        let (mut render_loop, _calls) = fixture(None);
        render_loop.start();
        let mut scheduler = ManualScheduler::sixty_hz();
        let ran = scheduler.pump_frames(10, |scheduler, time| {
            render_loop.run_frame(scheduler, &time);
            if time.index == 1 {
                scheduler.cancel();
            }
        });
        assert_eq!(ran, 2);
        assert_eq!(render_loop.stats().ticks, 2);
    }
}

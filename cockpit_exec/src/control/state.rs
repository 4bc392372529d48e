//! Control command generator state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex, PoisonError};
use log::{debug, info, trace, warn};

use comms_if::{net::{Transport, TransportExt}, trident::Topic};
use util::{module::State, timer::PeriodicTimer};

use super::{CtrlGenError, KeyEvent, LeverState, Mixer, MotorSpeed, Params};
use crate::event::{CockpitEvent, EventSink};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The control command generator.
///
/// Key events may be processed from any thread. While enabled a timer thread publishes the
/// setpoint derived from the levers once per period.
pub struct CtrlGen {
    params: Params,

    dispatch: Arc<Mutex<Dispatch>>,

    transport: Arc<dyn Transport>,

    timer: Mutex<Option<PeriodicTimer>>,

    motor_speed: Mutex<Option<MotorSpeed>>,

    events: EventSink,
}

/// State shared between key processing and the dispatch timer.
struct Dispatch {
    levers: LeverState,
    mixer: Mixer,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CtrlGen {
    /// Create a new disabled generator with all levers at rest.
    pub fn new(
        params: Params,
        transport: Arc<dyn Transport>,
        events: EventSink
    ) -> Result<Self, CtrlGenError> {
        let mut mixer = Mixer::default();
        mixer.init(params.actuator_id.clone())?;

        Ok(Self {
            params,
            dispatch: Arc::new(Mutex::new(Dispatch {
                levers: LeverState::default(),
                mixer
            })),
            transport,
            timer: Mutex::new(None),
            motor_speed: Mutex::new(None),
            events
        })
    }

    /// Process a key event, returning true if the key drives one of the levers.
    ///
    /// Events for other keys are left unchanged for the caller to handle.
    pub fn process_key(&self, event: &KeyEvent) -> bool {
        let mut dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);

        let handled = dispatch.levers.apply(event);

        if handled {
            trace!("{:?} {:?} -> {:?}", event.key, event.transition, dispatch.levers);
        }

        handled
    }

    /// Start publishing control targets. Does nothing if already enabled.
    pub fn enable(&self) -> Result<(), CtrlGenError> {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);

        if timer.as_ref().map(|t| t.is_running()).unwrap_or(false) {
            return Ok(())
        }

        let dispatch = self.dispatch.clone();
        let transport = self.transport.clone();

        *timer = Some(PeriodicTimer::start(
            "ctrl_gen",
            self.params.period(),
            move || dispatch_tick(&dispatch, transport.as_ref())
        ).map_err(CtrlGenError::TimerError)?);

        info!("Control generator enabled, period {} ms", self.params.period_ms);

        Ok(())
    }

    /// Stop publishing control targets and disengage the motor speed.
    ///
    /// The levers and the stop debounce are left as they are. Safe to call when not enabled.
    pub fn disable(&self) {
        let timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take();

        if let Some(mut t) = timer {
            t.stop();
            info!("Control generator disabled");
        }

        self.set_motor_speed(None);
    }

    pub fn is_enabled(&self) -> bool {
        self.timer.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.is_running())
            .unwrap_or(false)
    }

    /// Advance the motor speed to the next level, returning the new level.
    pub fn step_motor_speed(&self) -> Option<MotorSpeed> {
        let next = {
            let mut current = self.motor_speed.lock().unwrap_or_else(PoisonError::into_inner);
            *current = MotorSpeed::step(*current);
            *current
        };

        // Stepping always changes the level
        debug!("Motor speed now {:?}", next);
        self.events.emit(CockpitEvent::MotorSpeedChanged(next));

        next
    }

    pub fn motor_speed(&self) -> Option<MotorSpeed> {
        *self.motor_speed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current lever positions.
    pub fn levers(&self) -> LeverState {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner).levers
    }

    /// Run a single dispatch as the timer would.
    pub fn tick(&self) {
        dispatch_tick(&self.dispatch, self.transport.as_ref());
    }

    fn set_motor_speed(&self, speed: Option<MotorSpeed>) {
        let changed = {
            let mut current = self.motor_speed.lock().unwrap_or_else(PoisonError::into_inner);
            let changed = *current != speed;
            *current = speed;
            changed
        };

        if changed {
            debug!("Motor speed now {:?}", speed);
            self.events.emit(CockpitEvent::MotorSpeedChanged(speed));
        }
    }
}

impl Drop for CtrlGen {
    fn drop(&mut self) {
        self.disable();
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Mix the levers and publish the resulting control target, if any.
fn dispatch_tick(dispatch: &Mutex<Dispatch>, transport: &dyn Transport) {
    let target = {
        let mut d = dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        let levers = d.levers;

        match d.mixer.proc(&levers) {
            Ok((target, report)) => {
                trace!("Mixer report: {:?}", report);
                target
            },
            Err(e) => match e {}
        }
    };

    if let Some(target) = target {
        trace!("Control target: {:?}", target);

        if let Err(e) = transport.publish_msg(Topic::ControlTarget, &target) {
            warn!("Could not publish the control target: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::{thread, time::Duration};
    use comms_if::{net::{Handler, LocalBus, TransportError}, trident::ControlTarget};
    use crate::control::{Key, Modifiers};

    fn setup(params: Params)
        -> (CtrlGen, Arc<Mutex<Vec<ControlTarget>>>, std::sync::mpsc::Receiver<CockpitEvent>)
    {
        let bus = Arc::new(LocalBus::new());
        let sent = Arc::new(Mutex::new(Vec::new()));

        let s = sent.clone();
        bus.subscribe_msg(Topic::ControlTarget, move |t: ControlTarget| {
            s.lock().unwrap().push(t);
        });

        let (events, rx) = EventSink::channel();
        let gen = CtrlGen::new(params, bus, events).unwrap();

        (gen, sent, rx)
    }

    #[test]
    fn test_forward_then_single_stop() {
        let (gen, sent, _rx) = setup(Params::default());

        let shift = Modifiers { shift: true, ..Default::default() };
        assert!(gen.process_key(&KeyEvent::down(Key::UpArrow, shift)));

        gen.tick();
        {
            let sent = sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!((sent[0].thrust, sent[0].yaw, sent[0].pitch), (1.0, 0.0, 0.0));
            assert_eq!(sent[0].id, "control");
        }

        assert!(gen.process_key(&KeyEvent::up(Key::UpArrow)));
        gen.tick();
        gen.tick();

        {
            let sent = sent.lock().unwrap();
            assert_eq!(sent.len(), 2);
            assert_eq!((sent[1].thrust, sent[1].yaw, sent[1].pitch), (0.0, 0.0, 0.0));
        }

        for _ in 0..5 {
            gen.tick();
        }
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_unhandled_key() {
        let (gen, _, _rx) = setup(Params::default());
        assert!(!gen.process_key(&KeyEvent::down(Key::Char('q'), Modifiers::NONE)));
        assert_eq!(gen.levers(), LeverState::default());
    }

    #[test]
    fn test_empty_actuator_id_rejected() {
        let params = Params { actuator_id: String::new(), ..Default::default() };
        match CtrlGen::new(params, Arc::new(LocalBus::new()), EventSink::discard()) {
            Err(CtrlGenError::EmptyActuatorId) => (),
            _ => panic!("Expected EmptyActuatorId")
        }
    }

    #[test]
    fn test_timer_dispatch() {
        let (gen, sent, _rx) = setup(Params { period_ms: 10, ..Default::default() });

        // Never enabled
        gen.disable();
        assert!(!gen.is_enabled());

        gen.process_key(&KeyEvent::down(Key::LeftArrow, Modifiers::NONE));
        gen.enable().unwrap();
        gen.enable().unwrap();
        assert!(gen.is_enabled());

        thread::sleep(Duration::from_millis(150));
        gen.disable();
        gen.disable();
        assert!(!gen.is_enabled());

        let count = sent.lock().unwrap().len();
        assert!(count >= 2, "only {} targets sent", count);
        assert!(sent.lock().unwrap().iter().all(|t| t.yaw == -0.1));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(sent.lock().unwrap().len(), count);

        // Levers survive disable
        assert_eq!(gen.levers().left, 0.1);
    }

    #[test]
    fn test_motor_speed() {
        let (gen, _, rx) = setup(Params::default());

        assert_eq!(gen.motor_speed(), None);
        assert_eq!(gen.step_motor_speed(), Some(MotorSpeed::First));
        assert_eq!(gen.step_motor_speed(), Some(MotorSpeed::Second));

        gen.disable();
        assert_eq!(gen.motor_speed(), None);
        gen.disable();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events, vec![
            CockpitEvent::MotorSpeedChanged(Some(MotorSpeed::First)),
            CockpitEvent::MotorSpeedChanged(Some(MotorSpeed::Second)),
            CockpitEvent::MotorSpeedChanged(None),
        ]);

        for _ in 0..4 {
            gen.step_motor_speed();
        }
        assert_eq!(gen.motor_speed(), None);
    }

    /// Transport failing every other publish, counting the attempts.
    struct FlakyTransport {
        attempts: Mutex<u32>,
    }

    impl Transport for FlakyTransport {
        fn publish(&self, _: Topic, _: &str) -> Result<(), TransportError> {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            match *attempts % 2 {
                1 => Err(TransportError::LockPoisoned),
                _ => Ok(())
            }
        }
        fn subscribe(&self, _: Topic, _: Handler) {}
        fn unsubscribe(&self, _: Topic) {}
    }

    #[test]
    fn test_failed_publish_does_not_stop_dispatch() {
        let transport = Arc::new(FlakyTransport { attempts: Mutex::new(0) });
        let gen = CtrlGen::new(Params::default(), transport.clone(), EventSink::discard()).unwrap();

        gen.process_key(&KeyEvent::down(Key::RightArrow, Modifiers::NONE));
        gen.tick();
        gen.tick();
        assert_eq!(*transport.attempts.lock().unwrap(), 2);

        // The stop is attempted once even though the first attempt to publish it fails
        gen.process_key(&KeyEvent::up(Key::RightArrow));
        gen.tick();
        gen.tick();
        assert_eq!(*transport.attempts.lock().unwrap(), 3);
    }

    #[test]
    fn test_step_races_disable() {
        let (gen, _, _rx) = setup(Params::default());
        let gen = Arc::new(gen);

        for _ in 0..200 {
            gen.step_motor_speed();

            let g = gen.clone();
            let stepper = thread::spawn(move || { g.step_motor_speed(); });
            gen.disable();
            stepper.join().unwrap();

            // Either cleared by the disable, or stepped up from nothing after it
            assert!(matches!(gen.motor_speed(), None | Some(MotorSpeed::First)));
            gen.disable();
        }

        // Concurrent steps never lose an advance
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let g = gen.clone();
                thread::spawn(move || { g.step_motor_speed(); })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(gen.motor_speed(), Some(MotorSpeed::Third));
    }
}

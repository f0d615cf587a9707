//! Scripted GPIO chip for tests.
//!
//! Both lines read their level from a shared [`Levels`] pair. A level wait
//! returns at once when its line already reads the target level. Otherwise
//! line A's wait consumes the next [`MockEvent`] from a channel the test
//! feeds, and line B's never wakes on its own. An `Edge` event overwrites the
//! levels and wakes line A, so it doubles as the notification for changes on
//! either line.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::digital::{ErrorKind, ErrorType, InputPin};
use embedded_hal_async::digital::Wait;

use crate::decoder::Levels;
use crate::error::{Channel as Role, PendingErrors};
use crate::line::{Edge, GpioChip, LineDirection};
use crate::state::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MockError(pub &'static str);

impl embedded_hal::digital::Error for MockError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum MockEvent {
    /// Both lines now read these levels.
    Edge(bool, bool),
    /// The wait returns an error.
    WaitFault,
    /// The wait succeeds but the next read of line A fails.
    ReadFault,
    /// The wait panics.
    Panic,
}

#[derive(Default)]
struct Bus {
    levels: Levels,
    acquired: Vec<u32>,
    configured: Vec<(u32, LineDirection, Edge)>,
    released: Vec<u32>,
    fail_acquire: HashSet<u32>,
    fail_configure: HashSet<u32>,
    fail_read: HashSet<u32>,
    fail_release: HashSet<u32>,
    read_fault_armed: bool,
    wait_always_fails: bool,
    panicked: bool,
    read_delay: Duration,
    reads: u32,
}

type Events = Channel<CriticalSectionRawMutex, MockEvent, 8>;

/// Test-side view of a [`MockChip`]; stays valid after the chip moved into a session.
#[derive(Clone)]
pub(crate) struct MockHandle {
    bus: Arc<Mutex<Bus>>,
    events: Arc<Events>,
}

impl MockHandle {
    pub fn send(&self, event: MockEvent) {
        futures::executor::block_on(self.events.send(event));
    }

    pub fn edge(&self, a: bool, b: bool) {
        self.send(MockEvent::Edge(a, b));
    }

    pub fn acquired(&self) -> Vec<u32> {
        self.bus.lock().unwrap().acquired.clone()
    }

    pub fn released(&self) -> Vec<u32> {
        self.bus.lock().unwrap().released.clone()
    }

    pub fn configured(&self) -> Vec<(u32, LineDirection, Edge)> {
        self.bus.lock().unwrap().configured.clone()
    }

    /// Lines acquired but not (yet) released.
    pub fn held(&self) -> Vec<u32> {
        let bus = self.bus.lock().unwrap();
        bus.acquired
            .iter()
            .copied()
            .filter(|id| !bus.released.contains(id))
            .collect()
    }

    /// Change the levels without notifying any waiter.
    pub fn set_levels(&self, a: bool, b: bool) {
        self.bus.lock().unwrap().levels = Levels::new(a, b);
    }

    /// Make every level read take at least `delay`.
    pub fn set_read_delay(&self, delay: Duration) {
        self.bus.lock().unwrap().read_delay = delay;
    }

    /// Level reads completed so far, across both lines.
    pub fn reads(&self) -> u32 {
        self.bus.lock().unwrap().reads
    }

    pub fn fail_release(&self, line: u32) {
        self.bus.lock().unwrap().fail_release.insert(line);
    }

    /// The sampling thread hit a [`MockEvent::Panic`].
    pub fn panicked(&self) -> bool {
        self.bus.lock().unwrap().panicked
    }

    pub fn set_wait_always_fails(&self, fails: bool) {
        self.bus.lock().unwrap().wait_always_fails = fails;
    }
}

pub(crate) struct MockChip {
    handle: MockHandle,
}

impl MockChip {
    pub fn new() -> Self {
        Self::with_levels(false, false)
    }

    pub fn with_levels(a: bool, b: bool) -> Self {
        let bus = Bus {
            levels: Levels::new(a, b),
            ..Bus::default()
        };
        Self {
            handle: MockHandle {
                bus: Arc::new(Mutex::new(bus)),
                events: Arc::new(Channel::new()),
            },
        }
    }

    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }

    pub fn fail_acquire(self, line: u32) -> Self {
        self.handle.bus.lock().unwrap().fail_acquire.insert(line);
        self
    }

    pub fn fail_configure(self, line: u32) -> Self {
        self.handle.bus.lock().unwrap().fail_configure.insert(line);
        self
    }

    pub fn fail_read(self, line: u32) -> Self {
        self.handle.bus.lock().unwrap().fail_read.insert(line);
        self
    }
}

impl GpioChip for MockChip {
    type Error = MockError;
    type Line = MockLine;

    fn acquire(&mut self, line_id: u32) -> Result<MockLine, MockError> {
        let mut bus = self.handle.bus.lock().unwrap();
        if bus.fail_acquire.contains(&line_id) {
            return Err(MockError("acquire"));
        }
        let role = if bus.acquired.is_empty() { Role::A } else { Role::B };
        bus.acquired.push(line_id);

        Ok(MockLine {
            id: line_id,
            role,
            bus: self.handle.bus.clone(),
            events: match role {
                Role::A => Some(self.handle.events.clone()),
                Role::B => None,
            },
        })
    }

    fn configure(
        &mut self,
        line: &mut MockLine,
        direction: LineDirection,
        edge: Edge,
    ) -> Result<(), MockError> {
        let mut bus = self.handle.bus.lock().unwrap();
        if bus.fail_configure.contains(&line.id) {
            return Err(MockError("configure"));
        }
        bus.configured.push((line.id, direction, edge));
        Ok(())
    }

    fn release(&mut self, line: MockLine) -> Result<(), MockError> {
        let mut bus = self.handle.bus.lock().unwrap();
        bus.released.push(line.id);
        if bus.fail_release.contains(&line.id) {
            return Err(MockError("release"));
        }
        Ok(())
    }
}

pub(crate) struct MockLine {
    id: u32,
    role: Role,
    bus: Arc<Mutex<Bus>>,
    events: Option<Arc<Events>>,
}

impl ErrorType for MockLine {
    type Error = MockError;
}

impl InputPin for MockLine {
    fn is_high(&mut self) -> Result<bool, MockError> {
        let delay = self.bus.lock().unwrap().read_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut bus = self.bus.lock().unwrap();
        bus.reads += 1;
        if bus.fail_read.contains(&self.id) {
            return Err(MockError("read"));
        }
        match self.role {
            Role::A if bus.read_fault_armed => {
                bus.read_fault_armed = false;
                Err(MockError("read"))
            }
            Role::A => Ok(bus.levels.a),
            Role::B => Ok(bus.levels.b),
        }
    }

    fn is_low(&mut self) -> Result<bool, MockError> {
        self.is_high().map(|high| !high)
    }
}

impl MockLine {
    fn level(&self) -> bool {
        let bus = self.bus.lock().unwrap();
        match self.role {
            Role::A => bus.levels.a,
            Role::B => bus.levels.b,
        }
    }

    async fn wait_for_level(&mut self, high: bool) -> Result<(), MockError> {
        if self.bus.lock().unwrap().wait_always_fails {
            return Err(MockError("wait"));
        }
        if self.level() == high {
            return Ok(());
        }
        self.next_event().await
    }

    async fn next_event(&mut self) -> Result<(), MockError> {
        let Some(events) = self.events.clone() else {
            return core::future::pending().await;
        };

        match events.receive().await {
            MockEvent::Edge(a, b) => {
                self.bus.lock().unwrap().levels = Levels::new(a, b);
                Ok(())
            }
            MockEvent::WaitFault => Err(MockError("wait")),
            MockEvent::ReadFault => {
                self.bus.lock().unwrap().read_fault_armed = true;
                Ok(())
            }
            MockEvent::Panic => {
                self.bus.lock().unwrap().panicked = true;
                panic!("injected sampling panic")
            }
        }
    }
}

impl Wait for MockLine {
    async fn wait_for_high(&mut self) -> Result<(), MockError> {
        self.wait_for_level(true).await
    }

    async fn wait_for_low(&mut self) -> Result<(), MockError> {
        self.wait_for_level(false).await
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), MockError> {
        self.next_event().await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), MockError> {
        self.next_event().await
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), MockError> {
        self.next_event().await
    }
}

/// Poll `read_and_drain` until `done` accepts a result, or give up after a second.
pub(crate) fn drain_until<E>(
    state: &SharedState<E>,
    mut done: impl FnMut(&Result<i32, PendingErrors<E>>) -> bool,
) -> Result<i32, PendingErrors<E>> {
    let deadline = Instant::now() + Duration::from_secs(1);
    loop {
        let result = state.read_and_drain();
        if done(&result) || Instant::now() > deadline {
            return result;
        }
        std::thread::sleep(Duration::from_micros(200));
    }
}

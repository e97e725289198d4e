// SPDX-FileCopyrightText: 2024 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

#[cfg(feature = "std")]
extern crate std;

use alloc::{
    collections::BTreeMap,
    string::{String, ToString},
    vec,
    vec::Vec,
};
use core::{cell::Cell, cell::RefCell, fmt::Arguments, time::Duration};

use platform::{
    ActionCategory, Box, Button, DrawSettings2D, FileHandle, FileReadTask, InputDevice,
    InputDevices, Instant, Platform, PixelFormat, Semaphore, SpriteRef, TaskChannel, ThreadState,
    Vertex2D, AUDIO_CHANNELS,
};

/// A [`Platform`] implementation backed by in-memory state, for use in unit
/// tests that don't need a real window, GPU, or sound card.
///
/// `multithreaded` controls what [`Platform::available_parallelism`] reports,
/// so tests can exercise both the single- and multi-threaded code paths of
/// [`crate::multithreading`]. Actually spawning pool threads still requires
/// the `std` feature, regardless of this flag.
pub struct TestPlatform {
    current_time: Cell<Duration>,
    multithreaded: bool,

    next_sprite_id: Cell<u64>,
    sprites: RefCell<BTreeMap<u64, (u16, u16, usize)>>,

    next_file_handle: Cell<u64>,
    file_handles: RefCell<BTreeMap<u64, String>>,
    files: RefCell<BTreeMap<String, Vec<u8>>>,

    audio_buffer_start: Cell<u64>,
    audio_buffer: RefCell<Vec<[i16; AUDIO_CHANNELS]>>,
}

impl TestPlatform {
    /// Creates a new [`TestPlatform`]. If `multithreaded` is true,
    /// [`Platform::available_parallelism`] reports more than one thread.
    pub fn new(multithreaded: bool) -> TestPlatform {
        TestPlatform {
            current_time: Cell::new(Duration::from_millis(0)),
            multithreaded,
            next_sprite_id: Cell::new(1),
            sprites: RefCell::new(BTreeMap::new()),
            next_file_handle: Cell::new(1),
            file_handles: RefCell::new(BTreeMap::new()),
            files: RefCell::new(BTreeMap::new()),
            audio_buffer_start: Cell::new(0),
            audio_buffer: RefCell::new(Vec::new()),
        }
    }

    /// Advances the platform's simulated clock to `new_millis` milliseconds
    /// since the start of the test.
    pub fn set_elapsed_millis(&self, new_millis: u64) {
        self.current_time.set(Duration::from_millis(new_millis));
    }

    /// Registers a virtual file, so that [`Platform::open_file`] and the
    /// related read functions can read it back.
    pub fn set_file(&self, path: &str, contents: Vec<u8>) {
        self.files.borrow_mut().insert(path.to_string(), contents);
    }

    /// Returns the most recent [`Platform::update_audio_buffer`] call's
    /// arguments, for asserting on in tests.
    pub fn audio_buffer(&self) -> (u64, Vec<[i16; AUDIO_CHANNELS]>) {
        (
            self.audio_buffer_start.get(),
            self.audio_buffer.borrow().clone(),
        )
    }
}

impl Platform for TestPlatform {
    fn draw_area(&self) -> (f32, f32) {
        (320.0, 240.0)
    }

    fn draw_scale_factor(&self) -> f32 {
        1.0
    }

    fn draw_2d(&self, _vertices: &[Vertex2D], _indices: &[u32], _settings: DrawSettings2D) {}

    fn create_sprite(&self, width: u16, height: u16, format: PixelFormat) -> Option<SpriteRef> {
        let bytes_per_pixel = format.bytes_per_pixel();
        let id = self.next_sprite_id.get();
        self.next_sprite_id.set(id + 1);
        self.sprites
            .borrow_mut()
            .insert(id, (width, height, bytes_per_pixel));
        Some(SpriteRef::new(id))
    }

    fn update_sprite(
        &self,
        sprite: SpriteRef,
        x_offset: u16,
        y_offset: u16,
        width: u16,
        height: u16,
        pixels: &[u8],
    ) {
        let sprites = self.sprites.borrow();
        let &(sprite_width, sprite_height, bytes_per_pixel) = sprites
            .get(&sprite.inner())
            .expect("update_sprite called with a SpriteRef not from TestPlatform::create_sprite");
        assert!(
            x_offset + width <= sprite_width && y_offset + height <= sprite_height,
            "out of bounds sprite update",
        );
        assert_eq!(
            width as usize * height as usize * bytes_per_pixel,
            pixels.len()
        );
    }

    fn open_file(&self, path: &str) -> Option<FileHandle> {
        if !self.files.borrow().contains_key(path) {
            return None;
        }
        let id = self.next_file_handle.get();
        self.next_file_handle.set(id + 1);
        self.file_handles.borrow_mut().insert(id, path.to_string());
        Some(FileHandle::new(id))
    }

    fn file_size(&self, file: FileHandle) -> Option<u64> {
        let handles = self.file_handles.borrow();
        let path = handles.get(&file.inner())?;
        let files = self.files.borrow();
        Some(files.get(path)?.len() as u64)
    }

    fn begin_file_read(
        &self,
        file: FileHandle,
        first_byte: u64,
        buffer: Box<[u8]>,
    ) -> FileReadTask {
        FileReadTask::new(file, first_byte, buffer)
    }

    fn is_file_read_finished(&self, _task: &FileReadTask) -> bool {
        true
    }

    fn finish_file_read(&self, task: FileReadTask) -> Result<Box<[u8]>, Box<[u8]>> {
        let handles = self.file_handles.borrow();
        let Some(path) = handles.get(&task.file().inner()) else {
            // Safety: this impl never shares the buffer anywhere.
            return Err(unsafe { task.into_inner() });
        };
        let files = self.files.borrow();
        let Some(contents) = files.get(path) else {
            drop(files);
            drop(handles);
            // Safety: this impl never shares the buffer anywhere.
            return Err(unsafe { task.into_inner() });
        };
        let first_byte = task.task_id() as usize;
        let len = task.read_size();
        if first_byte + len > contents.len() {
            drop(files);
            drop(handles);
            // Safety: this impl never shares the buffer anywhere.
            return Err(unsafe { task.into_inner() });
        }
        let slice = contents[first_byte..first_byte + len].to_vec();
        drop(files);
        drop(handles);
        // Safety: this impl never shares the buffer anywhere.
        let mut buffer = unsafe { task.into_inner() };
        buffer.copy_from_slice(&slice);
        Ok(buffer)
    }

    #[cfg(feature = "std")]
    fn create_semaphore(&self) -> Semaphore {
        semaphore::create()
    }

    #[cfg(not(feature = "std"))]
    fn create_semaphore(&self) -> Semaphore {
        Semaphore::single_threaded()
    }

    fn available_parallelism(&self) -> usize {
        if self.multithreaded {
            4
        } else {
            1
        }
    }

    #[cfg(feature = "std")]
    fn spawn_pool_thread(&self, channels: [TaskChannel; 2]) -> ThreadState {
        let [(task_sender, mut task_receiver), (mut result_sender, result_receiver)] = channels;
        std::thread::Builder::new()
            .name(std::string::String::from("pool-thread-in-test"))
            .spawn(move || loop {
                let mut task = task_receiver.recv();
                task.run();
                'send_result: loop {
                    match result_sender.send(task) {
                        Ok(()) => break 'send_result,
                        Err(task_) => {
                            std::thread::sleep(Duration::from_millis(1));
                            task = task_;
                        }
                    }
                }
            })
            .unwrap();
        ThreadState::new(task_sender, result_receiver)
    }

    #[cfg(not(feature = "std"))]
    fn spawn_pool_thread(&self, _channels: [TaskChannel; 2]) -> ThreadState {
        unimplemented!("TestPlatform can only spawn threads with the \"std\" feature enabled")
    }

    fn update_audio_buffer(&self, first_position: u64, samples: &[[i16; AUDIO_CHANNELS]]) {
        self.audio_buffer_start.set(first_position);
        *self.audio_buffer.borrow_mut() = samples.to_vec();
    }

    fn audio_playback_position(&self) -> (u64, Instant) {
        (self.audio_buffer_start.get(), self.now())
    }

    fn input_devices(&self) -> InputDevices {
        let mut devices = InputDevices::new();
        devices.push(InputDevice::new(1234));
        devices
    }

    fn default_button_for_action(
        &self,
        action: ActionCategory,
        device: InputDevice,
    ) -> Option<Button> {
        match (action, device.inner()) {
            (ActionCategory::ActPrimary, 1234) => Some(Button::new(4321)),
            _ => None,
        }
    }

    fn now(&self) -> Instant {
        Instant::reference() + self.current_time.get()
    }

    fn println(&self, _message: Arguments) {}

    fn exit(&self, clean: bool) {
        if !clean {
            panic!("TestPlatform::exit({clean}) was called (test ran into an error?)");
        }
    }
}

#[cfg(feature = "std")]
mod semaphore {
    use std::boxed::Box;
    use std::sync::{Condvar, Mutex};

    use platform::SemaphoreImpl;

    struct Semaphore {
        value: Mutex<u32>,
        condvar: Condvar,
    }

    impl SemaphoreImpl for Semaphore {
        fn increment(&self) {
            let mut value_lock = self.value.lock().unwrap();
            *value_lock += 1;
            self.condvar.notify_one();
        }

        fn decrement(&self) {
            let mut value_lock = self.value.lock().unwrap();
            while *value_lock == 0 {
                value_lock = self.condvar.wait(value_lock).unwrap();
            }
            *value_lock -= 1;
        }
    }

    pub fn create() -> platform::Semaphore {
        let semaphore: &'static Semaphore = Box::leak(Box::new(Semaphore {
            value: Mutex::new(0),
            condvar: Condvar::new(),
        }));
        // Safety: the semaphore is leaked above, so it's valid for 'static.
        unsafe { platform::Semaphore::new(semaphore, None) }
    }
}

#[cfg(test)]
mod tests {
    use super::TestPlatform;
    use platform::{Platform, PixelFormat};

    #[test]
    fn reports_requested_parallelism() {
        assert_eq!(1, TestPlatform::new(false).available_parallelism());
        assert!(TestPlatform::new(true).available_parallelism() > 1);
    }

    #[test]
    fn simulates_file_reads() {
        let platform = TestPlatform::new(false);
        platform.set_file("greeting.txt", b"hello, world!".to_vec());
        let file = platform.open_file("greeting.txt").unwrap();
        let buffer = platform::Box::from_mut(vec![0u8; 5].leak());
        let task = platform.begin_file_read(file, 7, buffer);
        let buffer = platform.finish_file_read(task).unwrap();
        assert_eq!(b"world", &*buffer);
    }

    #[test]
    fn missing_files_do_not_open() {
        let platform = TestPlatform::new(false);
        assert!(platform.open_file("missing.txt").is_none());
    }

    #[test]
    fn sprite_updates_are_bounds_checked() {
        let platform = TestPlatform::new(false);
        let sprite = platform
            .create_sprite(4, 4, PixelFormat::Rgba)
            .expect("sprite creation should succeed");
        platform.update_sprite(sprite, 0, 0, 4, 4, &[0; 4 * 4 * 4]);
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_sprite_updates_panic() {
        let platform = TestPlatform::new(false);
        let sprite = platform
            .create_sprite(4, 4, PixelFormat::Rgba)
            .expect("sprite creation should succeed");
        platform.update_sprite(sprite, 0, 0, 8, 8, &[0; 8 * 8 * 4]);
    }
}

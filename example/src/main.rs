#[cfg(feature = "sdl2")]
fn main() {
    use engine::{allocators::static_allocator, Engine, EngineLimits};

    static PERSISTENT_ARENA: &engine::allocators::LinearAllocator =
        static_allocator!(64 * 1024 * 1024);

    let platform = platform_sdl2::Sdl2Platform::new("Example game");
    let mut engine = Engine::new(&platform, PERSISTENT_ARENA, EngineLimits::DEFAULT, &[]);
    platform.run_game_loop(&mut engine, (), ());
}

#[cfg(not(feature = "sdl2"))]
fn main() {
    compile_error!("at least one of the following platform features is required: 'sdl2'");
}

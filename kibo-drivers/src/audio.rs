//! Audio I/O manager
//!
//! Owns the capture and playback buffers and moves one bounded chunk of
//! samples to or from the audio peripherals per control-loop tick. The
//! manager is in at most one of {idle, recording, playing} at a time;
//! starting one side implicitly requires the other to be idle, which the
//! control loop guarantees by construction.
//!
//! Capture clamps to the remaining buffer capacity and then stops
//! filling while staying in Recording: a too-long recording loses its
//! tail rather than overflowing or aborting.

use kibo_core::traits::{AudioCapture, AudioPlayback};
use heapless::Vec;

/// Capture/playback buffer capacity in bytes
pub const AUDIO_BUFFER_CAPACITY: usize = 10 * 1024;

/// Bytes moved to or from a peripheral per tick
pub const AUDIO_CHUNK_BYTES: usize = 2048;

/// Fixed capture sample rate in Hz
pub const SAMPLE_RATE_HZ: u16 = 16_000;

/// Manager mode; the three are mutually exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioMode {
    #[default]
    Idle,
    Recording,
    Playing,
}

/// Audio I/O manager over a capture and a playback peripheral
pub struct AudioManager<I: AudioCapture, O: AudioPlayback> {
    mode: AudioMode,
    record_buf: Vec<u8, AUDIO_BUFFER_CAPACITY>,
    play_buf: Vec<u8, AUDIO_BUFFER_CAPACITY>,
    play_pos: usize,
    volume: u8,
    enabled: bool,
    mic: I,
    speaker: O,
}

impl<I: AudioCapture, O: AudioPlayback> AudioManager<I, O> {
    pub fn new(volume: u8, mic: I, mut speaker: O) -> Self {
        let volume = volume.min(100);
        speaker.set_volume(volume);
        Self {
            mode: AudioMode::Idle,
            record_buf: Vec::new(),
            play_buf: Vec::new(),
            play_pos: 0,
            volume,
            enabled: true,
            mic,
            speaker,
        }
    }

    pub fn mode(&self) -> AudioMode {
        self.mode
    }

    pub fn is_recording(&self) -> bool {
        self.mode == AudioMode::Recording
    }

    pub fn is_playing(&self) -> bool {
        self.mode == AudioMode::Playing
    }

    /// Disable all audio movement; stop operations still work
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Begin capturing from the microphone, discarding any previous
    /// recording. No-op while disabled.
    pub fn start_recording(&mut self) {
        if !self.enabled {
            return;
        }
        self.record_buf.clear();
        self.mode = AudioMode::Recording;
    }

    /// Freeze the recording. Only effective from Recording; the valid
    /// length is whatever the capture accumulated.
    pub fn stop_recording(&mut self) {
        if self.mode == AudioMode::Recording {
            self.mode = AudioMode::Idle;
        }
    }

    /// The finished (or in-progress) recording
    pub fn recorded(&self) -> &[u8] {
        &self.record_buf
    }

    /// Load a PCM clip and begin playback.
    ///
    /// Returns false without side effects for empty input or input
    /// exceeding the buffer capacity; the caller owns chunking anything
    /// larger.
    pub fn play(&mut self, pcm: &[u8]) -> bool {
        if !self.enabled || pcm.is_empty() || pcm.len() > AUDIO_BUFFER_CAPACITY {
            return false;
        }

        self.play_buf.clear();
        // Length was checked above
        let _ = self.play_buf.extend_from_slice(pcm);
        self.play_pos = 0;
        self.mode = AudioMode::Playing;
        true
    }

    /// Playback progress in bytes
    pub fn play_position(&self) -> usize {
        self.play_pos
    }

    /// Set output volume, clamped to 0-100
    pub fn set_volume(&mut self, percent: u8) {
        self.volume = percent.min(100);
        self.speaker.set_volume(self.volume);
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Move one chunk. Called once per control-loop tick.
    pub fn tick(&mut self) {
        if !self.enabled {
            return;
        }

        match self.mode {
            AudioMode::Idle => {}
            AudioMode::Recording => {
                let room = AUDIO_BUFFER_CAPACITY - self.record_buf.len();
                let want = room.min(AUDIO_CHUNK_BYTES);
                if want == 0 {
                    // Buffer full: stay in Recording, capture nothing
                    return;
                }

                let mut chunk = [0u8; AUDIO_CHUNK_BYTES];
                let got = self.mic.read(&mut chunk[..want]);
                let got = got.min(want);
                // Fits by construction of `want`
                let _ = self.record_buf.extend_from_slice(&chunk[..got]);
            }
            AudioMode::Playing => {
                let remaining = self.play_buf.len() - self.play_pos;
                let send = remaining.min(AUDIO_CHUNK_BYTES);
                if send > 0 {
                    let accepted = self
                        .speaker
                        .write(&self.play_buf[self.play_pos..self.play_pos + send]);
                    self.play_pos += accepted.min(send);
                }

                if self.play_pos >= self.play_buf.len() {
                    self.mode = AudioMode::Idle;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Microphone yielding an endless ramp pattern
    struct RampMic {
        next: u8,
    }

    impl AudioCapture for RampMic {
        fn read(&mut self, buf: &mut [u8]) -> usize {
            for byte in buf.iter_mut() {
                *byte = self.next;
                self.next = self.next.wrapping_add(1);
            }
            buf.len()
        }
    }

    #[derive(Default)]
    struct SpeakerLog {
        written: std::vec::Vec<u8>,
        volume: u8,
        /// Bytes accepted per write; usize::MAX = everything
        accept: usize,
    }

    impl AudioPlayback for &mut SpeakerLog {
        fn write(&mut self, buf: &[u8]) -> usize {
            let take = buf.len().min(self.accept);
            self.written.extend_from_slice(&buf[..take]);
            take
        }

        fn set_volume(&mut self, percent: u8) {
            self.volume = percent;
        }
    }

    fn manager(speaker: &mut SpeakerLog) -> AudioManager<RampMic, &mut SpeakerLog> {
        speaker.accept = usize::MAX;
        AudioManager::new(80, RampMic { next: 0 }, speaker)
    }

    #[test]
    fn test_starts_idle_with_configured_volume() {
        let mut speaker = SpeakerLog::default();
        let audio = manager(&mut speaker);
        assert_eq!(audio.mode(), AudioMode::Idle);
        assert_eq!(audio.volume(), 80);
        drop(audio);
        assert_eq!(speaker.volume, 80);
    }

    #[test]
    fn test_recording_accumulates_one_chunk_per_tick() {
        let mut speaker = SpeakerLog::default();
        let mut audio = manager(&mut speaker);

        audio.start_recording();
        audio.tick();
        assert_eq!(audio.recorded().len(), AUDIO_CHUNK_BYTES);
        audio.tick();
        assert_eq!(audio.recorded().len(), 2 * AUDIO_CHUNK_BYTES);

        audio.stop_recording();
        assert_eq!(audio.mode(), AudioMode::Idle);
        // Frozen: further ticks change nothing
        audio.tick();
        assert_eq!(audio.recorded().len(), 2 * AUDIO_CHUNK_BYTES);
        assert_eq!(audio.recorded()[0], 0);
        assert_eq!(audio.recorded()[1], 1);
    }

    #[test]
    fn test_capture_stops_silently_at_capacity() {
        let mut speaker = SpeakerLog::default();
        let mut audio = manager(&mut speaker);

        audio.start_recording();
        // Capacity divides evenly into chunks; run past it
        for _ in 0..(AUDIO_BUFFER_CAPACITY / AUDIO_CHUNK_BYTES + 3) {
            audio.tick();
        }

        assert_eq!(audio.recorded().len(), AUDIO_BUFFER_CAPACITY);
        // Deliberate clamp: still recording, just full
        assert!(audio.is_recording());
    }

    #[test]
    fn test_stop_recording_only_from_recording() {
        let mut speaker = SpeakerLog::default();
        let mut audio = manager(&mut speaker);

        assert!(audio.play(&[1, 2, 3]));
        audio.stop_recording();
        // Playback unaffected by a stray stop-recording
        assert!(audio.is_playing());
    }

    #[test]
    fn test_playback_drains_and_returns_to_idle() {
        let mut speaker = SpeakerLog::default();
        let mut audio = manager(&mut speaker);

        let clip: std::vec::Vec<u8> = (0..5000u32).map(|i| i as u8).collect();
        assert!(audio.play(&clip));
        assert!(audio.is_playing());

        // 5000 bytes move in ceil(5000/2048) = 3 ticks
        audio.tick();
        assert_eq!(audio.play_position(), 2048);
        audio.tick();
        audio.tick();
        assert_eq!(audio.mode(), AudioMode::Idle);
        drop(audio);
        assert_eq!(speaker.written, clip);
    }

    #[test]
    fn test_playback_respects_peripheral_backpressure() {
        let mut speaker = SpeakerLog::default();
        speaker.accept = 100;
        let mut audio = AudioManager::new(80, RampMic { next: 0 }, &mut speaker);

        assert!(audio.play(&[7u8; 300]));
        audio.tick();
        assert_eq!(audio.play_position(), 100);
        audio.tick();
        audio.tick();
        audio.tick();
        assert_eq!(audio.mode(), AudioMode::Idle);
    }

    #[test]
    fn test_play_rejects_empty_and_oversized() {
        let mut speaker = SpeakerLog::default();
        let mut audio = manager(&mut speaker);

        assert!(!audio.play(&[]));
        assert_eq!(audio.mode(), AudioMode::Idle);

        let oversized = vec![0u8; AUDIO_BUFFER_CAPACITY + 1];
        assert!(!audio.play(&oversized));
        assert_eq!(audio.mode(), AudioMode::Idle);
    }

    #[test]
    fn test_volume_clamped() {
        let mut speaker = SpeakerLog::default();
        let mut audio = manager(&mut speaker);

        audio.set_volume(130);
        assert_eq!(audio.volume(), 100);
        audio.set_volume(0);
        assert_eq!(audio.volume(), 0);
        drop(audio);
        assert_eq!(speaker.volume, 0);
    }

    #[test]
    fn test_disabled_blocks_capture_and_playback() {
        let mut speaker = SpeakerLog::default();
        let mut audio = manager(&mut speaker);

        audio.set_enabled(false);
        audio.start_recording();
        assert_eq!(audio.mode(), AudioMode::Idle);
        assert!(!audio.play(&[1, 2, 3]));
    }
}

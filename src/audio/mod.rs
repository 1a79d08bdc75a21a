//! PCM decoding through the encoder and scratch audio files.

pub(crate) mod pcm;

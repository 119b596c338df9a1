pub mod beat;
pub mod cepstrum;
pub mod chroma;
pub mod mel;
pub mod normalize;
pub mod onset;
pub mod spectral;
pub mod stft;
pub mod temporal;

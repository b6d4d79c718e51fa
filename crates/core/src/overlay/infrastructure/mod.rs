pub mod glyph_timestamp_overlay;

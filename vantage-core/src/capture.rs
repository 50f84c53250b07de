//! Window lookup and GDI screen capture.
//!
//! The target window is located once at start-up by its title. Its
//! client area, in screen coordinates, becomes the fixed capture region
//! for the rest of the session.
//!
//! # Platform
//!
//! Windows-only. On other platforms the types exist but lookup and
//! construction fail with [`VantageError::Unsupported`].

use crate::error::VantageError;
use crate::types::{RawFrame, Rect};

// ── FrameSource ──────────────────────────────────────────────────

/// Anything that yields full-resolution 4-channel frames.
pub trait FrameSource: Send {
    fn capture(&mut self) -> Result<RawFrame, VantageError>;

    /// Screen rectangle being captured.
    fn region(&self) -> Rect;
}

/// Reject a rectangle with no area.
pub fn validate_region(rect: Rect) -> Result<Rect, VantageError> {
    if rect.is_empty() {
        return Err(VantageError::EmptyCaptureRegion {
            width: rect.width(),
            height: rect.height(),
        });
    }
    Ok(rect)
}

/// Client-area rectangle of the top-level window titled `name`.
pub fn find_window_rect(name: &str) -> Result<Rect, VantageError> {
    validate_region(platform::client_rect(name)?)
}

// ── GdiCapturer ──────────────────────────────────────────────────

/// `BitBlt` + `GetDIBits` capturer for a fixed screen region.
///
/// The screen DC, memory DC and bitmap are created once and reused for
/// every frame.
pub struct GdiCapturer {
    region: Rect,
    #[cfg(target_os = "windows")]
    handles: platform::GdiHandles,
}

impl GdiCapturer {
    /// Capture the client area of the window titled `name`.
    pub fn for_window(name: &str) -> Result<Self, VantageError> {
        Self::new(find_window_rect(name)?)
    }

    pub fn width(&self) -> u32 {
        self.region.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.region.height() as u32
    }
}

impl FrameSource for GdiCapturer {
    fn capture(&mut self) -> Result<RawFrame, VantageError> {
        self.capture_frame()
    }

    fn region(&self) -> Rect {
        self.region
    }
}

// ── Windows implementation ───────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use super::*;
    use crate::types::PixelFormat;
    use windows::Win32::Foundation::{HWND, POINT, RECT};
    use windows::Win32::Graphics::Gdi::{
        BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BitBlt, ClientToScreen, CreateCompatibleBitmap,
        CreateCompatibleDC, DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, GetDIBits, HBITMAP,
        HDC, ReleaseDC, SRCCOPY, SelectObject,
    };
    use windows::Win32::UI::WindowsAndMessaging::{FindWindowW, GetClientRect};
    use windows::core::{HSTRING, PCWSTR};

    pub(super) fn client_rect(name: &str) -> Result<Rect, VantageError> {
        // SAFETY: both strings outlive the call.
        let hwnd: HWND = unsafe { FindWindowW(PCWSTR::null(), &HSTRING::from(name)) }
            .map_err(|_| VantageError::WindowNotFound(name.to_string()))?;
        if hwnd.is_invalid() {
            return Err(VantageError::WindowNotFound(name.to_string()));
        }

        let mut client = RECT::default();
        // SAFETY: `hwnd` is a live window handle.
        unsafe { GetClientRect(hwnd, &mut client) }
            .map_err(|e| VantageError::Capture(format!("GetClientRect: {e}")))?;

        let mut top_left = POINT {
            x: client.left,
            y: client.top,
        };
        let mut bottom_right = POINT {
            x: client.right,
            y: client.bottom,
        };
        // SAFETY: both points are valid for writes.
        let ok = unsafe {
            ClientToScreen(hwnd, &mut top_left).as_bool()
                && ClientToScreen(hwnd, &mut bottom_right).as_bool()
        };
        if !ok {
            return Err(VantageError::Capture("ClientToScreen failed".into()));
        }

        Ok(Rect {
            left: top_left.x,
            top: top_left.y,
            right: bottom_right.x,
            bottom: bottom_right.y,
        })
    }

    pub(super) struct GdiHandles {
        screen_dc: HDC,
        memory_dc: HDC,
        bitmap: HBITMAP,
    }

    // SAFETY: the handles are only ever used by the thread that owns the
    // capturer; GDI objects are not bound to their creating thread.
    unsafe impl Send for GdiHandles {}

    impl Drop for GdiHandles {
        fn drop(&mut self) {
            // SAFETY: handles were created in `GdiCapturer::new` and are
            // released exactly once.
            unsafe {
                let _ = DeleteObject(self.bitmap);
                let _ = DeleteDC(self.memory_dc);
                ReleaseDC(None, self.screen_dc);
            }
        }
    }

    impl GdiCapturer {
        /// Prepare GDI objects for capturing `region`.
        pub fn new(region: Rect) -> Result<Self, VantageError> {
            let region = validate_region(region)?;
            // SAFETY: plain GDI object creation; every handle is checked
            // and owned by `GdiHandles`, which releases them on drop.
            unsafe {
                let screen_dc = GetDC(None);
                if screen_dc.is_invalid() {
                    return Err(VantageError::Capture("GetDC returned null".into()));
                }
                let memory_dc = CreateCompatibleDC(screen_dc);
                let bitmap = CreateCompatibleBitmap(screen_dc, region.width(), region.height());
                let handles = GdiHandles {
                    screen_dc,
                    memory_dc,
                    bitmap,
                };
                if memory_dc.is_invalid() || bitmap.is_invalid() {
                    return Err(VantageError::Capture(
                        "could not create compatible DC / bitmap".into(),
                    ));
                }
                SelectObject(memory_dc, bitmap);
                Ok(Self { region, handles })
            }
        }

        pub(super) fn capture_frame(&mut self) -> Result<RawFrame, VantageError> {
            let width = self.region.width();
            let height = self.region.height();
            let h = &self.handles;

            // SAFETY: handles are live for the lifetime of `self`.
            unsafe {
                BitBlt(
                    h.memory_dc,
                    0,
                    0,
                    width,
                    height,
                    h.screen_dc,
                    self.region.left,
                    self.region.top,
                    SRCCOPY,
                )
            }
            .map_err(|e| VantageError::Capture(format!("BitBlt: {e}")))?;

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    // Negative height: top-down rows.
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };

            let mut data = vec![0u8; width as usize * height as usize * 4];
            // SAFETY: `data` holds exactly `height` top-down 32-bit rows.
            let lines = unsafe {
                GetDIBits(
                    h.memory_dc,
                    h.bitmap,
                    0,
                    height as u32,
                    Some(data.as_mut_ptr().cast()),
                    &mut info,
                    DIB_RGB_COLORS,
                )
            };
            if lines != height {
                return Err(VantageError::Capture(format!(
                    "GetDIBits copied {lines} of {height} rows"
                )));
            }

            Ok(RawFrame::packed(
                width as u32,
                height as u32,
                PixelFormat::Bgra8,
                data,
            ))
        }
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::*;

    pub(super) fn client_rect(_name: &str) -> Result<Rect, VantageError> {
        Err(VantageError::Unsupported("window lookup is only available on Windows"))
    }

    impl GdiCapturer {
        pub fn new(region: Rect) -> Result<Self, VantageError> {
            validate_region(region)?;
            Err(VantageError::Unsupported("GDI capture is only available on Windows"))
        }

        pub(super) fn capture_frame(&mut self) -> Result<RawFrame, VantageError> {
            Err(VantageError::Unsupported("GDI capture is only available on Windows"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_region_fails_fast() {
        let err = validate_region(Rect {
            left: 100,
            top: 100,
            right: 100,
            bottom: 400,
        })
        .unwrap_err();
        assert!(matches!(
            err,
            VantageError::EmptyCaptureRegion {
                width: 0,
                height: 300
            }
        ));
    }

    #[test]
    fn valid_region_passes() {
        let r = Rect {
            left: 0,
            top: 0,
            right: 1366,
            bottom: 768,
        };
        assert_eq!(validate_region(r).unwrap(), r);
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn lookup_is_unsupported_off_windows() {
        assert!(matches!(
            find_window_rect("MapleStory"),
            Err(VantageError::Unsupported(_))
        ));
    }
}

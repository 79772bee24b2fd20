//! 隔行场重组状态机.
//!
//! 硬件对隔行源逐场输出, 每场只有半高. 这里把先后到达的两场交织
//! 写入同一幅目标图像:
//!
//! ```text
//!            逐行图像                首场                    第二场
//! Empty ─────────────────▶ Empty   Empty ──────▶ Awaiting ──────────▶ Empty
//!        (输出完整帧)                (输出 Incomplete)      (输出完整帧)
//! ```
//!
//! 哪一场是 "第二场" 由当前场的极性与流的场序标志共同决定:
//! 当前是底场而流为顶场优先, 或当前是顶场而流为底场优先时, 即为第二场.

use chd_core::{ChdError, ChdResult};
use log::{debug, trace, warn};

use crate::device::{DecodedPicture, PictureFlags};
use crate::frame::{Decoded, DisplayGeometry, FieldFlags, VideoImage, VideoOutput};

/// 图像的扫描结构
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureStructure {
    /// 逐行 (或隔行标志被 "未知源" 否决)
    Progressive,
    /// 隔行中的一场
    Field {
        /// 当前是底场
        bottom: bool,
        /// 流为底场优先
        bottom_first: bool,
    },
}

impl PictureStructure {
    /// 由图像标志分类
    pub fn from_flags(flags: PictureFlags) -> Self {
        let interlaced = flags.contains(PictureFlags::INTERLACED_SRC)
            && !flags.contains(PictureFlags::UNKNOWN_SRC);
        if !interlaced {
            return Self::Progressive;
        }
        Self::Field {
            bottom: flags.contains(PictureFlags::BOTTOM_FIELD),
            bottom_first: flags.contains(PictureFlags::BOTTOM_FIRST),
        }
    }

    /// 是否为一对场中的第二场
    pub fn is_second_field(&self) -> bool {
        match self {
            Self::Progressive => false,
            Self::Field {
                bottom,
                bottom_first,
            } => bottom != bottom_first,
        }
    }
}

/// 已写入首场, 等待配对的图像
#[derive(Debug, Clone)]
struct PendingFrame {
    image: VideoImage,
    /// 首场是否为底场
    first_bottom: bool,
}

/// 场配对状态
#[derive(Debug, Clone, Default)]
enum PairingState {
    /// 没有待配对的图像
    #[default]
    Empty,
    /// 已有首场, 等待第二场
    AwaitingSecondField(PendingFrame),
}

/// 场重组器
#[derive(Debug, Default)]
pub struct FieldReassembler {
    state: PairingState,
}

impl FieldReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_awaiting_second_field(&self) -> bool {
        matches!(self.state, PairingState::AwaitingSecondField(_))
    }

    /// 丢弃待配对图像, 回到 `Empty`; 返回是否确实丢弃了内容
    pub fn reset(&mut self) -> bool {
        let discarded = self.is_awaiting_second_field();
        self.state = PairingState::Empty;
        discarded
    }

    /// 处理一幅取出的解码图像
    ///
    /// # 返回
    /// - `Decoded::Frame`: 逐行图像或配对完成的隔行图像
    /// - `Decoded::Incomplete`: 首场已缓存, 等待第二场
    ///
    /// # 错误
    /// - `FieldOrder`: `Empty` 状态收到第二场, 或第二场与首场极性相同.
    ///   出错后状态回到 `Empty`.
    /// - 目标图像分配失败时透传分配错误.
    pub fn accept<O>(
        &mut self,
        picture: &DecodedPicture,
        geometry: DisplayGeometry,
        output: &mut O,
    ) -> ChdResult<Decoded>
    where
        O: VideoOutput + ?Sized,
    {
        let structure = PictureStructure::from_flags(picture.flags);
        let state = std::mem::take(&mut self.state);

        match (state, structure) {
            (state, PictureStructure::Progressive) => {
                if let PairingState::AwaitingSecondField(_) = state {
                    warn!("场重组: 等待第二场时收到逐行图像, 丢弃未配对的首场");
                }
                let mut image = output.allocate_image(geometry, true)?;
                copy_progressive(picture, &mut image);
                image.timestamp = picture.timestamp;
                trace!("场重组: 逐行图像 #{}", picture.picture_number);
                Ok(Decoded::Frame(image))
            }
            (PairingState::Empty, PictureStructure::Field { bottom, .. })
                if !structure.is_second_field() =>
            {
                self.begin_pair(picture, geometry, structure, bottom, output)
            }
            (PairingState::Empty, PictureStructure::Field { bottom, .. }) => {
                Err(ChdError::FieldOrder(format!(
                    "没有首场时收到第二场, picture={}, bottom={bottom}",
                    picture.picture_number
                )))
            }
            (PairingState::AwaitingSecondField(_), PictureStructure::Field { bottom, .. })
                if !structure.is_second_field() =>
            {
                warn!(
                    "场重组: 等待第二场时又收到首场 #{}, 丢弃旧的首场",
                    picture.picture_number
                );
                self.begin_pair(picture, geometry, structure, bottom, output)
            }
            (
                PairingState::AwaitingSecondField(mut pending),
                PictureStructure::Field { bottom, .. },
            ) => {
                if bottom == pending.first_bottom {
                    return Err(ChdError::FieldOrder(format!(
                        "第二场与首场极性相同, picture={}, bottom={bottom}",
                        picture.picture_number
                    )));
                }
                copy_field(picture, &mut pending.image, bottom);
                debug!(
                    "场重组: 第二场 #{} ({}) 写入完成, 输出整帧",
                    picture.picture_number,
                    field_name(bottom)
                );
                Ok(Decoded::Frame(pending.image))
            }
        }
    }

    /// 分配目标图像, 写入首场并进入 `AwaitingSecondField`
    fn begin_pair<O>(
        &mut self,
        picture: &DecodedPicture,
        geometry: DisplayGeometry,
        structure: PictureStructure,
        bottom: bool,
        output: &mut O,
    ) -> ChdResult<Decoded>
    where
        O: VideoOutput + ?Sized,
    {
        let mut image = output.allocate_image(geometry, true)?;
        copy_field(picture, &mut image, bottom);
        image.timestamp = picture.timestamp;
        image.fields = FieldFlags::INTERLACED;
        if let PictureStructure::Field {
            bottom_first: false,
            ..
        } = structure
        {
            image.fields |= FieldFlags::TOP_FIRST;
        }
        debug!(
            "场重组: 首场 #{} ({}) 已缓存, 等待第二场",
            picture.picture_number,
            field_name(bottom)
        );
        self.state = PairingState::AwaitingSecondField(PendingFrame {
            image,
            first_bottom: bottom,
        });
        Ok(Decoded::Incomplete)
    }
}

fn field_name(bottom: bool) -> &'static str {
    if bottom { "底场" } else { "顶场" }
}

/// 整幅拷贝逐行图像
///
/// 行数与行宽都按源与目标中较小者截断.
pub fn copy_progressive(picture: &DecodedPicture, dst: &mut VideoImage) {
    let rows = picture.height as usize;
    copy_rows(picture, dst, rows, 0, 1);
}

/// 把半高的一场写入目标图像的隔行: 顶场写偶数行, 底场写奇数行
pub fn copy_field(picture: &DecodedPicture, dst: &mut VideoImage, bottom: bool) {
    let rows = picture.height as usize / 2;
    copy_rows(picture, dst, rows, usize::from(bottom), 2);
}

fn copy_rows(
    picture: &DecodedPicture,
    dst: &mut VideoImage,
    rows: usize,
    first_line: usize,
    line_step: usize,
) {
    let src_stride = picture.src_stride();
    if src_stride == 0 || dst.stride == 0 {
        return;
    }
    let row_bytes = src_stride.min(dst.stride);
    let src_rows = picture.y_buffer.len() / src_stride;
    let dst_rows = dst.height as usize;

    for (src_y, dst_y) in (0..rows.min(src_rows)).zip((first_line..dst_rows).step_by(line_step)) {
        let src = &picture.y_buffer[src_y * src_stride..src_y * src_stride + row_bytes];
        if let Some(row) = dst.row_mut(dst_y) {
            row[..row_bytes].copy_from_slice(src);
        }
    }
}

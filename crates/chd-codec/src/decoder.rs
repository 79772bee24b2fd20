//! 硬件解码适配器.
//!
//! 把宿主的 "送入一个访问单元, 取回至多一幅图像" 调用模型映射到
//! 异步的硬件设备上:
//! 1. 打开阶段按固定顺序初始化设备, 任一步失败都释放已获得的资源
//! 2. 每次 `decode` 在同一个循环里提交输入并轮询输出就绪
//! 3. 取到的图像交给场重组器, 隔行源要两场才输出一帧
//!
//! 设备资源由 [`DeviceSession`] 持有, 无论从哪条路径退出, 关闭序列只执行一次.

use std::thread;

use chd_core::{ChdResult, PixelFormat};
use log::{debug, error, trace, warn};

use crate::codec_parameters::{InputFormat, StreamParameters};
use crate::config::DecoderConfig;
use crate::device::{
    DecodedPicture, DeviceResult, DeviceStatus, HardwareDecoder, OutputColorSpace, Retrieved,
    StreamType,
};
use crate::fields::FieldReassembler;
use crate::frame::{Decoded, DisplayGeometry, VideoOutput};
use crate::packet::Packet;
use crate::pump::{InputPump, Offer, UnseenCounter};

/// 适配器唯一支持的输出像素格式
pub const OUTPUT_PIXEL_FORMAT: PixelFormat = PixelFormat::Yuy2;

/// 设备初始化已推进到的阶段, 决定关闭时需要撤销哪些步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionStage {
    /// 未打开或已关闭
    Closed,
    /// 设备已打开
    DeviceOpened,
    /// 解码器已打开
    DecoderOpened,
    /// 解码器已启动
    DecoderStarted,
}

/// 设备会话, 按已推进的阶段逆序关闭
#[derive(Debug)]
pub struct DeviceSession<D: HardwareDecoder> {
    device: D,
    stage: SessionStage,
}

impl<D: HardwareDecoder> DeviceSession<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            stage: SessionStage::Closed,
        }
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// 执行 open 序列
    ///
    /// 失败时由调用方丢弃会话, `Drop` 负责撤销已完成的步骤.
    pub fn start(&mut self, config: &DecoderConfig, format: &InputFormat) -> ChdResult<()> {
        setup_step("open", self.device.open(&config.open_mode))?;
        self.stage = SessionStage::DeviceOpened;

        setup_step("set_input_format", self.device.set_input_format(format))?;

        setup_step(
            "open_decoder",
            self.device.open_decoder(StreamType::Elementary),
        )?;
        self.stage = SessionStage::DecoderOpened;

        setup_step(
            "set_color_space",
            self.device.set_color_space(OutputColorSpace::Mode422Yuy2),
        )?;

        setup_step("start_decoder", self.device.start_decoder())?;
        self.stage = SessionStage::DecoderStarted;

        setup_step("start_capture", self.device.start_capture())?;
        debug!("设备初始化完成");
        Ok(())
    }

    /// 逆序撤销已完成的初始化步骤
    ///
    /// 关闭阶段的失败只记录日志, 后续步骤照常执行. 重复调用无副作用.
    pub fn shutdown(&mut self) {
        if self.stage == SessionStage::Closed {
            return;
        }
        if self.stage >= SessionStage::DecoderStarted {
            teardown_step("stop_decoder", self.device.stop_decoder());
        }
        if self.stage >= SessionStage::DecoderOpened {
            teardown_step("close_decoder", self.device.close_decoder());
        }
        teardown_step("close", self.device.close());
        self.stage = SessionStage::Closed;
        debug!("设备已关闭");
    }
}

impl<D: HardwareDecoder> Drop for DeviceSession<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn setup_step(op: &'static str, result: DeviceResult<()>) -> ChdResult<()> {
    result.map_err(|status| {
        error!("设备初始化失败: {op}: {status}");
        status.into_error(op)
    })
}

fn teardown_step(op: &'static str, result: DeviceResult<()>) {
    if let Err(status) = result {
        warn!("设备关闭步骤失败: {op}: {status}");
    }
}

/// 宿主控制命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// 查询是否支持某输出像素格式
    QueryFormat(PixelFormat),
    /// 流不连续 (seek), 丢弃管线中的状态
    ResyncStream,
    /// 查询尚未输出的帧数估计
    QueryUnseenFrames,
}

/// 控制命令的应答
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlReply {
    True,
    False,
    Unseen(u32),
}

/// 硬件解码适配器
pub struct ChdDecoder<D: HardwareDecoder, O: VideoOutput> {
    session: DeviceSession<D>,
    output: O,
    config: DecoderConfig,
    input_format: InputFormat,
    pump: InputPump,
    fields: FieldReassembler,
    unseen: UnseenCounter,
    geometry: DisplayGeometry,
}

impl<D: HardwareDecoder, O: VideoOutput> ChdDecoder<D, O> {
    /// 解析流参数并初始化设备
    ///
    /// # 错误
    /// - `UnknownCodec` / `MalformedConfig`: 流参数无法使用, 设备不会被打开
    /// - `Device`: 初始化序列某步失败, 已获得的设备资源在返回前释放
    pub fn open(
        device: D,
        output: O,
        params: &StreamParameters,
        config: DecoderConfig,
    ) -> ChdResult<Self> {
        let input_format = InputFormat::resolve(params)?;
        debug!(
            "打开解码器: subtype={} (hw={}), metadata={} 字节, {}x{}",
            input_format.subtype,
            input_format.subtype.hw_code(),
            input_format.metadata_size(),
            params.width,
            params.height
        );

        let mut session = DeviceSession::new(device);
        session.start(&config, &input_format)?;

        Ok(Self {
            session,
            output,
            pump: InputPump::new(&config),
            config,
            input_format,
            fields: FieldReassembler::new(),
            unseen: UnseenCounter::default(),
            geometry: DisplayGeometry::new(params.width, params.height),
        })
    }

    /// 送入一个访问单元, 取回至多一幅图像
    ///
    /// 空包表示没有新输入, 只轮询输出.
    ///
    /// # 返回
    /// - `Frame`: 完整图像
    /// - `Incomplete`: 隔行首场已缓存, 本次不显示
    /// - `Nothing`: 暂无输出 (输入已满, 设备忙或格式变化)
    ///
    /// # 错误
    /// 设备返回非忙失败时返回 `ChdError::Device`, 本次调用没有输出,
    /// 适配器状态保持一致, 宿主可在下一次调度时继续调用.
    pub fn decode(&mut self, packet: &Packet) -> ChdResult<Decoded> {
        trace!("decode: size={}, pts={}ms", packet.size(), packet.pts_ms);
        if packet.drop_requested {
            debug!("宿主请求丢帧, 设备处于 drop-repeat 模式, 忽略");
        }

        if !self.pump_until_ready(packet)? {
            debug!("没有就绪的输出帧, 返回");
            return Ok(Decoded::Nothing);
        }

        let first = self.receive()?;
        if first != Decoded::Incomplete {
            return Ok(first);
        }

        // 一个访问单元的两场可能已同时就绪
        match self.session.device_mut().ready_count() {
            Ok(ready) if ready > 0 => {}
            Ok(_) => return Ok(Decoded::Incomplete),
            Err(status) => {
                debug!("查询就绪数失败: {status}");
                return Ok(Decoded::Incomplete);
            }
        }
        match self.receive() {
            Ok(Decoded::Frame(image)) => {
                debug!("同一次调用内取到第二场");
                Ok(Decoded::Frame(image))
            }
            Ok(_) => Ok(Decoded::Incomplete),
            Err(err) => {
                warn!("第二次取输出失败: {err}");
                Ok(Decoded::Incomplete)
            }
        }
    }

    /// 提交输入并等待输出就绪
    ///
    /// 只有在输入被推迟且没有输出就绪时才继续循环. 返回是否有输出就绪.
    fn pump_until_ready(&mut self, packet: &Packet) -> ChdResult<bool> {
        let timestamp = packet.hw_timestamp();
        let mut pending = (!packet.is_empty()).then_some(&packet.data);
        let mut rounds = 0u32;

        loop {
            let mut input_full = false;
            match pending {
                Some(data) => {
                    match self.pump.offer(self.session.device_mut(), data, timestamp)? {
                        Offer::Accepted => {
                            pending = None;
                            self.unseen.increment();
                            trace!("输入已提交, unseen={}", self.unseen.get());
                        }
                        Offer::Deferred => input_full = true,
                    }
                }
                None => trace!("没有更多输入"),
            }

            let ready = self
                .session
                .device_mut()
                .ready_count()
                .map_err(|status| status.into_error("get_driver_status"))?;
            if ready > 0 {
                if input_full {
                    warn!(
                        "输入缓冲区已满但已有输出就绪, 丢弃本次访问单元 ({} 字节, pts={}ms)",
                        packet.size(),
                        packet.pts_ms
                    );
                }
                return Ok(true);
            }
            if !input_full {
                return Ok(false);
            }

            rounds += 1;
            if rounds >= self.config.max_wait_rounds {
                warn!("输入持续已满且无输出, 放弃本次提交 (rounds={rounds})");
                return Ok(false);
            }
            thread::sleep(self.config.backoff());
        }
    }

    /// 取一次输出并交给场重组器
    fn receive(&mut self) -> ChdResult<Decoded> {
        let timeout = self.config.output_timeout();
        match self.session.device_mut().retrieve(timeout) {
            Ok(Retrieved::FormatChanged { width, height }) => {
                self.geometry = DisplayGeometry::from_reported(width, height);
                debug!(
                    "输出格式变化: 报告 {width}x{height}, 显示 {}x{}",
                    self.geometry.width, self.geometry.height
                );
                // 首场按旧尺寸分配, 不能与新尺寸的第二场拼合
                if self.fields.reset() {
                    debug!("输出格式变化: 丢弃未配对的首场");
                }
                self.output.configure(self.geometry, OUTPUT_PIXEL_FORMAT);
                Ok(Decoded::Nothing)
            }
            Ok(Retrieved::Picture(picture)) => {
                let result = if picture.info_valid() {
                    log_picture(&picture, self.geometry);
                    self.fields.accept(&picture, self.geometry, &mut self.output)
                } else {
                    debug!("图像信息块无效, 丢弃 #{}", picture.picture_number);
                    Ok(Decoded::Nothing)
                };
                self.session.device_mut().release_output();

                let decoded = result?;
                if decoded.is_frame() {
                    self.unseen.decrement();
                }
                Ok(decoded)
            }
            Err(DeviceStatus::Busy) => {
                thread::sleep(self.config.backoff());
                Ok(Decoded::Nothing)
            }
            Err(status) => {
                error!("取输出失败: {status}");
                Err(status.into_error("proc_output"))
            }
        }
    }

    /// 处理宿主控制命令
    pub fn control(&mut self, command: ControlCommand) -> ControlReply {
        match command {
            ControlCommand::QueryFormat(format) => {
                if Self::query_format(format) {
                    ControlReply::True
                } else {
                    ControlReply::False
                }
            }
            ControlCommand::ResyncStream => {
                self.resync();
                ControlReply::True
            }
            ControlCommand::QueryUnseenFrames => ControlReply::Unseen(self.unseen_frames()),
        }
    }

    /// 是否支持该输出像素格式
    pub fn query_format(format: PixelFormat) -> bool {
        format == OUTPUT_PIXEL_FORMAT
    }

    /// 流不连续: 清零计数, 丢弃待配对首场, 清空设备输入
    ///
    /// 设备清空失败只记录日志.
    pub fn resync(&mut self) {
        self.unseen.reset();
        if self.fields.reset() {
            debug!("重同步: 丢弃未配对的首场");
        }
        if let Err(status) = self.session.device_mut().flush_input(self.config.flush_mode) {
            warn!("重同步时清空输入失败: {status}");
        }
    }

    /// 尚未输出帧数的估计: 固定基数加实时计数
    pub fn unseen_frames(&self) -> u32 {
        self.config.unseen_baseline.saturating_add(self.unseen.get())
    }

    /// 实时的已提交未输出计数
    pub fn unseen(&self) -> u32 {
        self.unseen.get()
    }

    pub fn geometry(&self) -> DisplayGeometry {
        self.geometry
    }

    pub fn input_format(&self) -> &InputFormat {
        &self.input_format
    }

    pub fn is_awaiting_second_field(&self) -> bool {
        self.fields.is_awaiting_second_field()
    }

    pub fn device(&self) -> &D {
        self.session.device()
    }

    pub fn device_mut(&mut self) -> &mut D {
        self.session.device_mut()
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// 关闭设备并归还输出回调
    pub fn close(mut self) -> O {
        self.session.shutdown();
        let Self { output, .. } = self;
        output
    }
}

fn log_picture(picture: &DecodedPicture, geometry: DisplayGeometry) {
    trace!(
        "图像 #{}: y_buffer={} 字节, ts={}, {}x{} (显示 {}x{}), flags={:?}",
        picture.picture_number,
        picture.y_buffer.len(),
        picture.timestamp,
        picture.width,
        picture.height,
        geometry.width,
        geometry.height,
        picture.flags
    );
}
